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


//! Coupon codes and their redemption bookkeeping.

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::NaiveDate;
use sqlx::{Executor, PgConnection, Postgres};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "coupon_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
	/// Money off a paid plan.
	Discount,
	/// Free access to a plan for a number of months.
	FreePlan,
	/// Same as `FreePlan`, offered as an upgrade of the current plan.
	FreeUpgrade,
}

impl CouponType {
	pub fn grants_plan(&self) -> bool {
		matches!(self, CouponType::FreePlan | CouponType::FreeUpgrade)
	}
}

/// A coupon together with the plan it grants, if any.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Coupon {
	pub id: i32,
	pub code: String,
	pub coupon_type: CouponType,
	pub description: Option<String>,
	pub discount_percent: Option<i32>,
	pub discount_amount_cents: Option<i64>,
	pub free_plan_id: Option<i32>,
	pub free_duration_months: Option<i32>,
	pub valid_from: NaiveDate,
	pub valid_until: NaiveDate,
	pub max_uses: Option<i32>,
	pub current_uses: i32,
	pub plan_name: Option<String>,
	pub plan_coins: Option<i32>,
}

/// Fields of a new coupon.
#[derive(Clone, Debug)]
pub struct NewCoupon<'a> {
	pub code: &'a str,
	pub coupon_type: CouponType,
	pub description: Option<&'a str>,
	pub discount_percent: Option<i32>,
	pub discount_amount_cents: Option<i64>,
	pub free_plan_id: Option<i32>,
	pub free_duration_months: Option<i32>,
	pub valid_from: NaiveDate,
	pub valid_until: NaiveDate,
	pub max_uses: Option<i32>,
}

/// Codes are matched trimmed and uppercased.
pub fn normalize_coupon_code(code: &str) -> String {
	code.trim().to_uppercase()
}

const VALID_COUPON_SELECT: &str = r#"
	SELECT c.id, c.code, c.coupon_type, c.description, c.discount_percent,
		c.discount_amount_cents, c.free_plan_id, c.free_duration_months,
		c.valid_from, c.valid_until, c.max_uses, c.current_uses,
		p.name AS plan_name, p.coin_limit AS plan_coins
	FROM coupon_codes c
	LEFT JOIN subscription_plans p ON p.id = c.free_plan_id
	WHERE c.code = $1
		AND c.valid_from <= $2
		AND c.valid_until >= $2
		AND (c.max_uses IS NULL OR c.current_uses < c.max_uses)
"#;

/// A coupon that is redeemable on `today`, looked up by normalized code.
pub async fn get_valid_coupon<'e, E>(executor: E, code: &str, today: NaiveDate) -> Result<Option<Coupon>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, Coupon>(VALID_COUPON_SELECT)
		.bind(code)
		.bind(today)
		.fetch_optional(executor)
		.await
}

/// Same as `get_valid_coupon`, holding the coupon row until the transaction
/// ends so concurrent redemptions cannot overrun `max_uses`.
pub async fn lock_valid_coupon(
	conn: &mut PgConnection,
	code: &str,
	today: NaiveDate,
) -> Result<Option<Coupon>, sqlx::Error> {
	sqlx::query_as::<_, Coupon>(&format!("{} FOR UPDATE OF c", VALID_COUPON_SELECT))
		.bind(code)
		.bind(today)
		.fetch_optional(conn)
		.await
}

pub async fn user_used_coupon<'e, E>(executor: E, user_id: i32, coupon_id: i32) -> Result<bool, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_subscriptions WHERE user_id = $1 AND coupon_id = $2)")
		.bind(user_id)
		.bind(coupon_id)
		.fetch_one(executor)
		.await
}

/// Tie a subscription to the coupon that paid for it.
pub async fn mark_subscription_from_coupon(
	conn: &mut PgConnection,
	subscription_id: i32,
	coupon_id: i32,
) -> Result<(), sqlx::Error> {
	sqlx::query("UPDATE user_subscriptions SET coupon_id = $2, is_free_from_coupon = TRUE WHERE id = $1")
		.bind(subscription_id)
		.bind(coupon_id)
		.execute(conn)
		.await?;

	Ok(())
}

pub async fn increment_uses(conn: &mut PgConnection, coupon_id: i32) -> Result<(), sqlx::Error> {
	sqlx::query("UPDATE coupon_codes SET current_uses = current_uses + 1 WHERE id = $1")
		.bind(coupon_id)
		.execute(conn)
		.await?;

	Ok(())
}

/// Returns the new coupon's id.
pub async fn insert_coupon<'e, E>(executor: E, coupon: &NewCoupon<'_>) -> Result<i32, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar(
		r#"
		INSERT INTO coupon_codes
			(code, coupon_type, description, discount_percent, discount_amount_cents,
			free_plan_id, free_duration_months, valid_from, valid_until, max_uses)
		VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
		RETURNING id
		"#,
	)
	.bind(normalize_coupon_code(coupon.code))
	.bind(coupon.coupon_type)
	.bind(coupon.description)
	.bind(coupon.discount_percent)
	.bind(coupon.discount_amount_cents)
	.bind(coupon.free_plan_id)
	.bind(coupon.free_duration_months)
	.bind(coupon.valid_from)
	.bind(coupon.valid_until)
	.bind(coupon.max_uses)
	.fetch_one(executor)
	.await
}

pub async fn delete_coupon<'e, E>(executor: E, id: i32) -> Result<bool, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query("DELETE FROM coupon_codes WHERE id = $1")
		.bind(id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize_coupon_code() {
		assert_eq!(normalize_coupon_code("  freeyear \n"), "FREEYEAR");
		assert_eq!(normalize_coupon_code("Welcome20"), "WELCOME20");
		assert_eq!(normalize_coupon_code("   "), "");
	}

	#[test]
	fn test_coupon_type_wire_names() {
		assert_eq!(serde_json::to_string(&CouponType::FreeUpgrade).unwrap(), r#""free_upgrade""#);
		assert!(CouponType::FreePlan.grants_plan());
		assert!(!CouponType::Discount.grants_plan());
	}
}
