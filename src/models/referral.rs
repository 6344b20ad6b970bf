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

use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::{Executor, PgConnection, Postgres};

pub const REFERRAL_CODE_LENGTH: usize = 8;

/// How many fresh codes we try before giving up on a collision streak.
const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Default, Serialize, sqlx::FromRow)]
pub struct ReferralCounts {
	pub total_clicks: i64,
	pub total_signups: i64,
	pub total_conversions: i64,
	pub earned_coins: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ReferralSignup {
	pub full_name: String,
	pub email: String,
	pub created_at: DateTime<Utc>,
}

/// Random uppercase alphanumeric code.
pub fn generate_referral_code() -> String {
	rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(REFERRAL_CODE_LENGTH)
		.map(|c| char::from(c).to_ascii_uppercase())
		.collect()
}

/// Codes are matched case-insensitively and only contain ASCII
/// alphanumerics.
pub fn normalize_referral_code(code: &str) -> Option<String> {
	let code = code.trim();
	if code.is_empty() || code.len() > 32 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
		return None;
	}
	Some(code.to_ascii_uppercase())
}

/// Give the user a referral code, unless they already own one.
pub async fn create_referral_link(conn: &mut PgConnection, user_id: i32) -> Result<String, sqlx::Error> {
	if let Some(code) = get_referral_code(&mut *conn, user_id).await? {
		return Ok(code);
	}

	let mut last_code = generate_referral_code();
	for _ in 0..MAX_CODE_ATTEMPTS {
		let inserted: Option<String> = sqlx::query_scalar(
			r#"
			INSERT INTO referral_links (user_id, referral_code)
			VALUES ($1, $2)
			ON CONFLICT DO NOTHING
			RETURNING referral_code
			"#,
		)
		.bind(user_id)
		.bind(&last_code)
		.fetch_optional(&mut *conn)
		.await?;

		if let Some(code) = inserted {
			return Ok(code);
		}
		last_code = generate_referral_code();
	}

	Err(sqlx::Error::Protocol(format!(
		"Could not allocate a unique referral code for [user_id={}]",
		user_id
	)))
}

pub async fn get_referral_code<'e, E>(executor: E, user_id: i32) -> Result<Option<String>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar("SELECT referral_code FROM referral_links WHERE user_id = $1")
		.bind(user_id)
		.fetch_optional(executor)
		.await
}

pub async fn get_referrer_by_code<'e, E>(executor: E, code: &str) -> Result<Option<i32>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar("SELECT user_id FROM referral_links WHERE referral_code = $1")
		.bind(code)
		.fetch_optional(executor)
		.await
}

pub async fn record_click<'e, E>(executor: E, referrer_user_id: i32) -> Result<(), sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"INSERT INTO referral_events (referrer_user_id, event_type) VALUES ($1, 'click')",
	)
	.bind(referrer_user_id)
	.execute(executor)
	.await?;

	Ok(())
}

/// Record that `referred_user_id` signed up through `referrer_user_id`.
/// Returns false when that user already has a signup event.
pub async fn record_signup(
	conn: &mut PgConnection,
	referrer_user_id: i32,
	referred_user_id: i32,
) -> Result<bool, sqlx::Error> {
	let result = sqlx::query(
		r#"
		INSERT INTO referral_events (referrer_user_id, referred_user_id, event_type)
		VALUES ($1, $2, 'signup')
		ON CONFLICT (referred_user_id) WHERE event_type = 'signup' DO NOTHING
		"#,
	)
	.bind(referrer_user_id)
	.bind(referred_user_id)
	.execute(conn)
	.await?;

	Ok(result.rows_affected() == 1)
}

/// Clicks, signups, conversions (referred users who paid at least once) and
/// bonus coins earned by a referrer.
pub async fn referral_counts<'e, E>(executor: E, user_id: i32) -> Result<ReferralCounts, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, ReferralCounts>(
		r#"
		SELECT
			(SELECT COUNT(*) FROM referral_events
				WHERE referrer_user_id = $1 AND event_type = 'click') AS total_clicks,
			(SELECT COUNT(*) FROM referral_events
				WHERE referrer_user_id = $1 AND event_type = 'signup') AS total_signups,
			(SELECT COUNT(DISTINCT re.referred_user_id) FROM referral_events re
				JOIN payments p ON p.user_id = re.referred_user_id
				WHERE re.referrer_user_id = $1 AND re.event_type = 'signup') AS total_conversions,
			(SELECT COALESCE(SUM(amount), 0)::BIGINT FROM coin_transactions
				WHERE user_id = $1 AND reason = 'referral_bonus') AS earned_coins
		"#,
	)
	.bind(user_id)
	.fetch_one(executor)
	.await
}

pub async fn recent_signups<'e, E>(
	executor: E,
	user_id: i32,
	limit: i64,
) -> Result<Vec<ReferralSignup>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, ReferralSignup>(
		r#"
		SELECT u.full_name, u.email, re.created_at
		FROM referral_events re
		JOIN users u ON u.id = re.referred_user_id
		WHERE re.referrer_user_id = $1 AND re.event_type = 'signup'
		ORDER BY re.created_at DESC
		LIMIT $2
		"#,
	)
	.bind(user_id)
	.bind(limit)
	.fetch_all(executor)
	.await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_generate_referral_code() {
		let code = generate_referral_code();
		assert_eq!(code.len(), REFERRAL_CODE_LENGTH);
		assert!(code
			.chars()
			.all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
	}

	#[test]
	fn test_normalize_referral_code() {
		assert_eq!(normalize_referral_code(" ab12cd34 "), Some("AB12CD34".into()));
		assert_eq!(normalize_referral_code(""), None);
		assert_eq!(normalize_referral_code("ab-12"), None);
	}
}
