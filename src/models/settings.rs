// VectraHub - Image Vectorization
// Copyright (C) 2024 VectraHub

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::collections::BTreeMap;

use sqlx::{Executor, PgConnection, Postgres};

/// Longest accepted setting key.
pub const MAX_KEY_LENGTH: usize = 100;

pub async fn get_settings<'e, E>(executor: E) -> Result<BTreeMap<String, String>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	let rows: Vec<(String, String)> =
		sqlx::query_as("SELECT setting_key, setting_value FROM system_settings")
			.fetch_all(executor)
			.await?;

	Ok(rows.into_iter().collect())
}

pub async fn upsert_setting(conn: &mut PgConnection, key: &str, value: &str) -> Result<(), sqlx::Error> {
	sqlx::query(
		r#"
		INSERT INTO system_settings (setting_key, setting_value)
		VALUES ($1, $2)
		ON CONFLICT (setting_key)
		DO UPDATE SET setting_value = EXCLUDED.setting_value, updated_at = NOW()
		"#,
	)
	.bind(key)
	.bind(value)
	.execute(conn)
	.await?;

	Ok(())
}

/// Keys are lowercase ASCII words joined by underscores.
pub fn is_valid_key(key: &str) -> bool {
	!key.is_empty()
		&& key.len() <= MAX_KEY_LENGTH
		&& key
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_valid_key() {
		assert!(is_valid_key("maintenance_mode"));
		assert!(!is_valid_key(""));
		assert!(!is_valid_key("Robert'); DROP TABLE"));
		assert!(!is_valid_key(&"a".repeat(101)));
	}
}
