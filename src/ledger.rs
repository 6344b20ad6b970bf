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

//! The coin ledger. A user's spendable balance lives in `users.coins`, and
//! every change to it is mirrored by a `coin_transactions` row.

use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::activity_log::{log_activity, AD_VIEW};
use crate::models::user;
use sqlx::{Executor, PgConnection, Postgres};

/// Coins credited per rewarded ad view.
pub const AD_VIEW_REWARD: i32 = 3;
/// Rewarded ad views allowed per user and calendar day (UTC).
pub const MAX_AD_VIEWS_PER_DAY: i64 = 5;
/// Coins credited to a referrer when a referred user signs up.
pub const REFERRAL_SIGNUP_BONUS: i32 = 50;
/// Coins debited per vectorized image.
pub const VECTORIZE_COST: i32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoinReason {
	AdView,
	ReferralBonus,
	SubscriptionPurchase,
	PlanGrant,
	Vectorization,
	AdminAdjustment,
	Coupon,
}

impl CoinReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			CoinReason::AdView => "ad_view",
			CoinReason::ReferralBonus => "referral_bonus",
			CoinReason::SubscriptionPurchase => "subscription_purchase",
			CoinReason::PlanGrant => "plan_grant",
			CoinReason::Vectorization => "vectorization",
			CoinReason::AdminAdjustment => "admin_adjustment",
			CoinReason::Coupon => "coupon",
		}
	}
}

/// Result of a rewarded ad view.
#[derive(Debug, PartialEq, Eq)]
pub struct AdViewReward {
	pub coins_awarded: i32,
	pub views_today: i64,
	pub balance: i32,
}

async fn append_transaction(
	conn: &mut PgConnection,
	user_id: i32,
	amount: i32,
	reason: CoinReason,
) -> Result<(), sqlx::Error> {
	sqlx::query("INSERT INTO coin_transactions (user_id, amount, reason) VALUES ($1, $2, $3)")
		.bind(user_id)
		.bind(amount)
		.bind(reason.as_str())
		.execute(conn)
		.await?;

	Ok(())
}

/// Add coins to a user's balance. Returns the new balance.
pub async fn credit(
	conn: &mut PgConnection,
	user_id: i32,
	amount: i32,
	reason: CoinReason,
) -> Result<i32, VectraError> {
	let balance: Option<i32> = sqlx::query_scalar(
		"UPDATE users SET coins = coins + $2, updated_at = NOW() WHERE id = $1 RETURNING coins",
	)
	.bind(user_id)
	.bind(amount)
	.fetch_optional(&mut *conn)
	.await?;

	let balance = balance.ok_or_else(|| VectraError::NotFound("User not found".into()))?;
	append_transaction(conn, user_id, amount, reason).await?;

	log::debug!(
		target: "vectrahub",
		"Credited [coins={}] to [user_id={}] for [reason={}]",
		amount,
		user_id,
		reason.as_str()
	);

	Ok(balance)
}

/// Take coins from a user's balance. The update only applies when the balance
/// covers the amount, so the balance can never go negative.
pub async fn debit(
	conn: &mut PgConnection,
	user_id: i32,
	amount: i32,
	reason: CoinReason,
) -> Result<i32, VectraError> {
	let balance: Option<i32> = sqlx::query_scalar(
		r#"
		UPDATE users SET coins = coins - $2, updated_at = NOW()
		WHERE id = $1 AND coins >= $2
		RETURNING coins
		"#,
	)
	.bind(user_id)
	.bind(amount)
	.fetch_optional(&mut *conn)
	.await?;

	let balance = balance.ok_or(VectraError::InsufficientCoins)?;
	append_transaction(conn, user_id, -amount, reason).await?;

	Ok(balance)
}

/// Set a user's balance to an exact value, recording the difference.
pub async fn set_balance(
	conn: &mut PgConnection,
	user_id: i32,
	coins: i32,
	reason: CoinReason,
) -> Result<i32, VectraError> {
	if coins < 0 {
		return Err(VectraError::Validation("Coins cannot be negative".into()));
	}

	let previous: Option<i32> =
		sqlx::query_scalar("SELECT coins FROM users WHERE id = $1 FOR UPDATE")
			.bind(user_id)
			.fetch_optional(&mut *conn)
			.await?;
	let previous = previous.ok_or_else(|| VectraError::NotFound("User not found".into()))?;

	if previous != coins {
		sqlx::query("UPDATE users SET coins = $2, updated_at = NOW() WHERE id = $1")
			.bind(user_id)
			.bind(coins)
			.execute(&mut *conn)
			.await?;
		append_transaction(conn, user_id, coins - previous, reason).await?;
	}

	Ok(coins)
}

/// Raise a user's balance to `coins` when it is lower. Returns the balance.
pub async fn top_up(
	conn: &mut PgConnection,
	user_id: i32,
	coins: i32,
	reason: CoinReason,
) -> Result<i32, VectraError> {
	let current: Option<i32> = sqlx::query_scalar("SELECT coins FROM users WHERE id = $1 FOR UPDATE")
		.bind(user_id)
		.fetch_optional(&mut *conn)
		.await?;
	let current = current.ok_or_else(|| VectraError::NotFound("User not found".into()))?;

	if current >= coins {
		return Ok(current);
	}
	credit(conn, user_id, coins - current, reason).await
}

pub async fn balance<'e, E>(executor: E, user_id: i32) -> Result<i32, VectraError>
where
	E: Executor<'e, Database = Postgres>,
{
	let coins: Option<i32> = sqlx::query_scalar("SELECT coins FROM users WHERE id = $1")
		.bind(user_id)
		.fetch_optional(executor)
		.await?;

	coins.ok_or_else(|| VectraError::NotFound("User not found".into()))
}

/// Number of rewarded ad views since midnight UTC.
pub async fn ad_views_today<'e, E>(executor: E, user_id: i32) -> Result<i64, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar(
		r#"
		SELECT COUNT(*) FROM ad_views
		WHERE user_id = $1
			AND viewed_at >= date_trunc('day', NOW() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'
		"#,
	)
	.bind(user_id)
	.fetch_one(executor)
	.await
}

pub fn can_view_ad(views_today: i64) -> bool {
	views_today < MAX_AD_VIEWS_PER_DAY
}

/// Record a rewarded ad view and credit its coins. The user row is locked
/// first so concurrent requests of the same user are serialized, and the
/// daily cap is checked inside that lock.
pub async fn record_ad_view(pool: &PgPool, user_id: i32) -> Result<AdViewReward, VectraError> {
	let mut tx = pool.begin().await?;

	if !user::lock_user(&mut tx, user_id).await? {
		return Err(VectraError::NotFound("User not found".into()));
	}

	let views_today = ad_views_today(&mut *tx, user_id).await?;
	if !can_view_ad(views_today) {
		return Err(VectraError::Validation("Daily ad view limit reached".into()));
	}

	sqlx::query("INSERT INTO ad_views (user_id) VALUES ($1)")
		.bind(user_id)
		.execute(&mut *tx)
		.await?;
	let balance = credit(&mut tx, user_id, AD_VIEW_REWARD, CoinReason::AdView).await?;
	log_activity(
		&mut *tx,
		AD_VIEW,
		&format!("Ad view rewarded with {} coins", AD_VIEW_REWARD),
		Some(user_id),
	)
	.await?;

	tx.commit().await?;

	Ok(AdViewReward {
		coins_awarded: AD_VIEW_REWARD,
		views_today: views_today + 1,
		balance,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_daily_ad_cap() {
		assert!(can_view_ad(0));
		assert!(can_view_ad(4));
		assert!(!can_view_ad(5));
		assert!(!can_view_ad(6));
	}

	#[test]
	fn test_reason_names() {
		assert_eq!(CoinReason::SubscriptionPurchase.as_str(), "subscription_purchase");
		assert_eq!(CoinReason::ReferralBonus.as_str(), "referral_bonus");
	}
}
