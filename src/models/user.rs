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

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::{Executor, PgConnection, Postgres};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
	User,
	Admin,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct User {
	pub id: i32,
	pub full_name: String,
	pub email: String,
	#[serde(skip_serializing)]
	pub password_hash: String,
	pub role: UserRole,
	pub coins: i32,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl User {
	pub fn is_admin(&self) -> bool {
		self.role == UserRole::Admin
	}
}

/// A user row as listed in the admin back-office.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserSummary {
	pub id: i32,
	pub full_name: String,
	pub email: String,
	pub role: UserRole,
	pub coins: i32,
	pub created_at: DateTime<Utc>,
	pub job_count: i64,
	pub active_plan: Option<String>,
}

const USER_COLUMNS: &str =
	"id, full_name, email, password_hash, role, coins, created_at, updated_at";

pub async fn get_user_by_id<'e, E>(executor: E, id: i32) -> Result<Option<User>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
		.bind(id)
		.fetch_optional(executor)
		.await
}

/// Take the row lock on a user for the rest of the transaction. Returns false
/// when the user does not exist.
pub async fn lock_user(conn: &mut PgConnection, id: i32) -> Result<bool, sqlx::Error> {
	let locked: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
		.bind(id)
		.fetch_optional(conn)
		.await?;

	Ok(locked.is_some())
}

/// Emails are compared case-insensitively.
pub async fn get_user_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, User>(&format!(
		"SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
		USER_COLUMNS
	))
	.bind(email)
	.fetch_optional(executor)
	.await
}

pub async fn create_user(
	conn: &mut PgConnection,
	full_name: &str,
	email: &str,
	password_hash: &str,
) -> Result<User, sqlx::Error> {
	sqlx::query_as::<_, User>(&format!(
		r#"
		INSERT INTO users (full_name, email, password_hash, role)
		VALUES ($1, $2, $3, 'user')
		RETURNING {}
		"#,
		USER_COLUMNS
	))
	.bind(full_name)
	.bind(email)
	.bind(password_hash)
	.fetch_one(conn)
	.await
}

/// Update name and role, leaving `None` fields untouched.
pub async fn update_user(
	conn: &mut PgConnection,
	id: i32,
	full_name: Option<&str>,
	role: Option<UserRole>,
) -> Result<Option<User>, sqlx::Error> {
	sqlx::query_as::<_, User>(&format!(
		r#"
		UPDATE users
		SET full_name = COALESCE($2, full_name),
			role = COALESCE($3, role),
			updated_at = NOW()
		WHERE id = $1
		RETURNING {}
		"#,
		USER_COLUMNS
	))
	.bind(id)
	.bind(full_name)
	.bind(role)
	.fetch_optional(conn)
	.await
}

/// Returns whether a row was deleted.
pub async fn delete_user<'e, E>(executor: E, id: i32) -> Result<bool, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query("DELETE FROM users WHERE id = $1")
		.bind(id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() > 0)
}

/// Search users by name or email, optionally filtered by role.
pub async fn list_users<'e, E>(
	executor: E,
	search: Option<&str>,
	role: Option<UserRole>,
	limit: i64,
	offset: i64,
) -> Result<Vec<UserSummary>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, UserSummary>(
		r#"
		SELECT u.id, u.full_name, u.email, u.role, u.coins, u.created_at,
			(SELECT COUNT(*) FROM image_jobs j WHERE j.user_id = u.id) AS job_count,
			(
				SELECT p.name FROM user_subscriptions s
				JOIN subscription_plans p ON p.id = s.plan_id
				WHERE s.user_id = u.id AND s.active
			) AS active_plan
		FROM users u
		WHERE ($1::TEXT IS NULL OR u.full_name ILIKE $1 OR u.email ILIKE $1)
			AND ($2::user_role IS NULL OR u.role = $2)
		ORDER BY u.created_at DESC
		LIMIT $3 OFFSET $4
		"#,
	)
	.bind(search.map(like_pattern))
	.bind(role)
	.bind(limit)
	.bind(offset)
	.fetch_all(executor)
	.await
}

pub async fn count_users<'e, E>(
	executor: E,
	search: Option<&str>,
	role: Option<UserRole>,
) -> Result<i64, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar(
		r#"
		SELECT COUNT(*) FROM users u
		WHERE ($1::TEXT IS NULL OR u.full_name ILIKE $1 OR u.email ILIKE $1)
			AND ($2::user_role IS NULL OR u.role = $2)
		"#,
	)
	.bind(search.map(like_pattern))
	.bind(role)
	.fetch_one(executor)
	.await
}

/// Wrap a search term for `ILIKE`, escaping its wildcards.
pub fn like_pattern(term: &str) -> String {
	let escaped = term
		.replace('\\', "\\\\")
		.replace('%', "\\%")
		.replace('_', "\\_");
	format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_like_pattern_escapes_wildcards() {
		assert_eq!(like_pattern("john"), "%john%");
		assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
	}

	#[test]
	fn test_password_hash_is_not_serialized() {
		let user = User {
			id: 1,
			full_name: "Ada".into(),
			email: "ada@example.com".into(),
			password_hash: "$2b$12$secret".into(),
			role: UserRole::Admin,
			coins: 10,
			created_at: Utc::now(),
			updated_at: Utc::now(),
		};
		let json = serde_json::to_value(&user).unwrap();
		assert!(json.get("password_hash").is_none());
		assert_eq!(json["role"], "admin");
	}
}
