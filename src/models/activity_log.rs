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

//! Two audit trails: `activity_logs` for business events shown on the admin
//! dashboard, `system_logs` for security-relevant actions with their origin.

use serde::Serialize;
use sqlx::types::chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, Postgres};

pub const SUBSCRIPTION_PURCHASED: &str = "SUBSCRIPTION_PURCHASED";
pub const FREE_PLAN_ACTIVATED: &str = "FREE_PLAN_ACTIVATED";
pub const COUPON_APPLIED: &str = "COUPON_APPLIED";
pub const PAYMENT_FAILED: &str = "PAYMENT_FAILED";
pub const SUBSCRIPTION_CANCELLED: &str = "SUBSCRIPTION_CANCELLED";
pub const SUBSCRIPTION_EXPIRED: &str = "SUBSCRIPTION_EXPIRED";
pub const USER_REGISTERED: &str = "USER_REGISTERED";
pub const USER_LOGIN: &str = "USER_LOGIN";
pub const AD_VIEW: &str = "AD_VIEW";
pub const REFERRAL_SIGNUP: &str = "REFERRAL_SIGNUP";
pub const ADMIN_ACTION: &str = "ADMIN_ACTION";

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ActivityLog {
	pub id: i32,
	#[sqlx(rename = "type")]
	#[serde(rename = "type")]
	pub kind: String,
	pub description: String,
	pub user_id: Option<i32>,
	pub user_email: Option<String>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SystemLog {
	pub id: i32,
	#[sqlx(rename = "type")]
	#[serde(rename = "type")]
	pub kind: String,
	pub description: String,
	pub user_id: Option<i32>,
	pub user_email: Option<String>,
	pub ip_address: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// Filters for the admin system log listing.
#[derive(Debug, Default)]
pub struct SystemLogFilter<'a> {
	pub kind: Option<&'a str>,
	pub date: Option<NaiveDate>,
	pub search: Option<&'a str>,
}

pub async fn log_activity<'e, E>(
	executor: E,
	kind: &str,
	description: &str,
	user_id: Option<i32>,
) -> Result<(), sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query("INSERT INTO activity_logs (type, description, user_id) VALUES ($1, $2, $3)")
		.bind(kind)
		.bind(description)
		.bind(user_id)
		.execute(executor)
		.await?;

	Ok(())
}

pub async fn log_system<'e, E>(
	executor: E,
	kind: &str,
	description: &str,
	user_id: Option<i32>,
	ip_address: Option<&str>,
) -> Result<(), sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		r#"
		INSERT INTO system_logs (type, description, user_id, ip_address)
		VALUES ($1, $2, $3, $4)
		"#,
	)
	.bind(kind)
	.bind(description)
	.bind(user_id)
	.bind(ip_address)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn recent_activity<'e, E>(executor: E, limit: i64) -> Result<Vec<ActivityLog>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, ActivityLog>(
		r#"
		SELECT a.id, a.type, a.description, a.user_id, u.email AS user_email, a.created_at
		FROM activity_logs a
		LEFT JOIN users u ON u.id = a.user_id
		ORDER BY a.created_at DESC, a.id DESC
		LIMIT $1
		"#,
	)
	.bind(limit)
	.fetch_all(executor)
	.await
}

/// Delete activity older than `days`. Returns the number of rows removed.
pub async fn purge_activity_older_than<'e, E>(executor: E, days: i32) -> Result<u64, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query(
		"DELETE FROM activity_logs WHERE created_at < NOW() - make_interval(days => $1)",
	)
	.bind(days)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

pub async fn list_system_logs<'e, E>(
	executor: E,
	filter: &SystemLogFilter<'_>,
	limit: i64,
	offset: i64,
) -> Result<Vec<SystemLog>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, SystemLog>(
		r#"
		SELECT l.id, l.type, l.description, l.user_id, u.email AS user_email,
			l.ip_address, l.created_at
		FROM system_logs l
		LEFT JOIN users u ON u.id = l.user_id
		WHERE ($1::TEXT IS NULL OR l.type = $1)
			AND ($2::DATE IS NULL OR l.created_at::DATE = $2)
			AND ($3::TEXT IS NULL OR l.description ILIKE $3)
		ORDER BY l.created_at DESC, l.id DESC
		LIMIT $4 OFFSET $5
		"#,
	)
	.bind(filter.kind)
	.bind(filter.date)
	.bind(filter.search.map(super::user::like_pattern))
	.bind(limit)
	.bind(offset)
	.fetch_all(executor)
	.await
}

pub async fn count_system_logs<'e, E>(
	executor: E,
	filter: &SystemLogFilter<'_>,
) -> Result<i64, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar(
		r#"
		SELECT COUNT(*) FROM system_logs l
		WHERE ($1::TEXT IS NULL OR l.type = $1)
			AND ($2::DATE IS NULL OR l.created_at::DATE = $2)
			AND ($3::TEXT IS NULL OR l.description ILIKE $3)
		"#,
	)
	.bind(filter.kind)
	.bind(filter.date)
	.bind(filter.search.map(super::user::like_pattern))
	.fetch_one(executor)
	.await
}
