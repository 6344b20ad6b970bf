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

use super::plan::BillingPeriod;
use serde::Serialize;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::{Executor, PgConnection, Postgres};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Subscription {
	pub id: i32,
	pub user_id: i32,
	pub plan_id: i32,
	pub active: bool,
	pub start_date: DateTime<Utc>,
	pub end_date: DateTime<Utc>,
	pub auto_renew: bool,
	pub stripe_subscription_id: Option<String>,
}

/// A subscription joined with its plan and owner, as shown on the billing
/// page and in the admin back-office.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct SubscriptionDetails {
	pub id: i32,
	pub user_id: i32,
	pub user_email: String,
	pub plan_id: i32,
	pub plan_name: String,
	pub price_cents: i64,
	pub coin_limit: i32,
	pub billing_period: BillingPeriod,
	pub active: bool,
	pub start_date: DateTime<Utc>,
	pub end_date: DateTime<Utc>,
	pub auto_renew: bool,
}

#[derive(Debug, Default, Serialize, sqlx::FromRow)]
pub struct SubscriptionStats {
	pub total: i64,
	pub active: i64,
	pub expired: i64,
}

const SUBSCRIPTION_COLUMNS: &str =
	"id, user_id, plan_id, active, start_date, end_date, auto_renew, stripe_subscription_id";

const DETAILS_SELECT: &str = r#"
	SELECT s.id, s.user_id, u.email AS user_email, s.plan_id, p.name AS plan_name,
		p.price_cents, p.coin_limit, p.billing_period, s.active, s.start_date,
		s.end_date, s.auto_renew
	FROM user_subscriptions s
	JOIN subscription_plans p ON p.id = s.plan_id
	JOIN users u ON u.id = s.user_id
"#;

/// Returns the number of subscriptions that were switched off.
pub async fn deactivate_user_subscriptions(
	conn: &mut PgConnection,
	user_id: i32,
) -> Result<u64, sqlx::Error> {
	let result = sqlx::query(
		r#"
		UPDATE user_subscriptions
		SET active = FALSE, updated_at = NOW()
		WHERE user_id = $1 AND active
		"#,
	)
	.bind(user_id)
	.execute(conn)
	.await?;

	Ok(result.rows_affected())
}

/// Insert a new active subscription. The caller must have deactivated the
/// user's previous one in the same transaction.
pub async fn insert_active_subscription(
	conn: &mut PgConnection,
	user_id: i32,
	plan_id: i32,
	end_date: DateTime<Utc>,
	auto_renew: bool,
	stripe_subscription_id: Option<&str>,
) -> Result<Subscription, sqlx::Error> {
	sqlx::query_as::<_, Subscription>(&format!(
		r#"
		INSERT INTO user_subscriptions
			(user_id, plan_id, active, start_date, end_date, auto_renew, stripe_subscription_id)
		VALUES ($1, $2, TRUE, NOW(), $3, $4, $5)
		RETURNING {}
		"#,
		SUBSCRIPTION_COLUMNS
	))
	.bind(user_id)
	.bind(plan_id)
	.bind(end_date)
	.bind(auto_renew)
	.bind(stripe_subscription_id)
	.fetch_one(conn)
	.await
}

pub async fn get_active_subscription<'e, E>(
	executor: E,
	user_id: i32,
) -> Result<Option<SubscriptionDetails>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, SubscriptionDetails>(&format!(
		"{} WHERE s.user_id = $1 AND s.active",
		DETAILS_SELECT
	))
	.bind(user_id)
	.fetch_optional(executor)
	.await
}

/// Mark the subscription linked to a Stripe subscription id inactive.
/// `cancel` also turns auto-renewal off. Returns the affected rows' users.
pub async fn deactivate_by_stripe_id<'e, E>(
	executor: E,
	stripe_subscription_id: &str,
	cancel: bool,
) -> Result<Vec<i32>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar(
		r#"
		UPDATE user_subscriptions
		SET active = FALSE,
			auto_renew = CASE WHEN $2 THEN FALSE ELSE auto_renew END,
			updated_at = NOW()
		WHERE stripe_subscription_id = $1
		RETURNING user_id
		"#,
	)
	.bind(stripe_subscription_id)
	.bind(cancel)
	.fetch_all(executor)
	.await
}

/// Deactivate every active subscription past its end date, returning the
/// expired rows.
pub async fn expire_overdue<'e, E>(executor: E) -> Result<Vec<Subscription>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, Subscription>(&format!(
		r#"
		UPDATE user_subscriptions
		SET active = FALSE, updated_at = NOW()
		WHERE active AND end_date < NOW()
		RETURNING {}
		"#,
		SUBSCRIPTION_COLUMNS
	))
	.fetch_all(executor)
	.await
}

/// `status` is `active`, `expired`, or anything else for all.
pub async fn list_subscriptions<'e, E>(
	executor: E,
	status: Option<&str>,
	limit: i64,
	offset: i64,
) -> Result<Vec<SubscriptionDetails>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, SubscriptionDetails>(&format!(
		r#"{}
		WHERE ($1::TEXT IS NULL
			OR ($1 = 'active' AND s.active)
			OR ($1 = 'expired' AND NOT s.active))
		ORDER BY s.created_at DESC
		LIMIT $2 OFFSET $3
		"#,
		DETAILS_SELECT
	))
	.bind(status)
	.bind(limit)
	.bind(offset)
	.fetch_all(executor)
	.await
}

pub async fn subscription_stats<'e, E>(executor: E) -> Result<SubscriptionStats, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, SubscriptionStats>(
		r#"
		SELECT COUNT(*) AS total,
			COUNT(*) FILTER (WHERE active) AS active,
			COUNT(*) FILTER (WHERE NOT active) AS expired
		FROM user_subscriptions
		"#,
	)
	.fetch_one(executor)
	.await
}
