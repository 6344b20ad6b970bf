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

//! Subscription state transitions: purchases reconciled from Stripe
//! webhooks, free plan activation, coupon redemption, payment failures,
//! cancellations and expiry.
//!
//! A user has at most one active subscription. Every activation deactivates
//! the previous one and inserts the new one in the same transaction, and a
//! partial unique index on `user_subscriptions (user_id) WHERE active` backs
//! that up.

use crate::db::{is_unique_violation, PgPool};
use crate::errors::VectraError;
use crate::ledger::{self, CoinReason};
use crate::models::{
	activity_log::{self, log_activity},
	cents_to_dollars,
	checkout_order::{self, CheckoutOrder},
	coupon::{self, normalize_coupon_code, CouponType},
	payment,
	plan::{self, BillingPeriod, Plan},
	subscription::{self, Subscription},
	user,
};
use crate::stripe::{CheckoutSession, Invoice, SubscriptionObject};
use chrono::{DateTime, Duration, Months, Utc};
use sqlx::PgConnection;

/// Activity logs older than this are purged by the expiry sweep.
pub const ACTIVITY_RETENTION_DAYS: i32 = 30;

/// What a `checkout.session.completed` event did.
#[derive(Debug, PartialEq, Eq)]
pub enum CheckoutOutcome {
	Activated {
		user_id: i32,
		plan_id: i32,
		subscription_id: i32,
	},
	/// The session was already reconciled by an earlier delivery.
	AlreadyProcessed,
	/// The event cannot be applied. Logged and acknowledged so Stripe stops
	/// redelivering it.
	Ignored(String),
}

/// End of a billing period starting at `from`. Month ends are clamped, so
/// Jan 31 + 1 month is the last day of February.
pub fn expiration_for(period: BillingPeriod, from: DateTime<Utc>) -> DateTime<Utc> {
	let (months, fallback_days) = match period {
		BillingPeriod::Monthly => (1, 30),
		BillingPeriod::Yearly => (12, 365),
	};

	from.checked_add_months(Months::new(months))
		.unwrap_or_else(|| from + Duration::days(fallback_days))
}

/// `from` plus `months` calendar months, clamped at month ends.
pub fn months_after(from: DateTime<Utc>, months: u32) -> DateTime<Utc> {
	from.checked_add_months(Months::new(months))
		.unwrap_or_else(|| from + Duration::days(30 * i64::from(months)))
}

/// Decide who bought which plan. A local checkout order is authoritative;
/// session metadata that disagrees with it is refused. Without an order the
/// metadata is all we have.
pub fn resolve_purchase(
	session: &CheckoutSession,
	order: Option<&CheckoutOrder>,
) -> Result<(i32, i32), String> {
	match order {
		Some(order) => {
			if let Some(user_id) = session.user_id() {
				if user_id != order.user_id {
					return Err(format!(
						"metadata user_id {} does not match checkout order user_id {}",
						user_id, order.user_id
					));
				}
			}
			if let Some(plan_id) = session.plan_id() {
				if plan_id != order.plan_id {
					return Err(format!(
						"metadata plan_id {} does not match checkout order plan_id {}",
						plan_id, order.plan_id
					));
				}
			}
			Ok((order.user_id, order.plan_id))
		}
		None => match (session.user_id(), session.plan_id()) {
			(Some(user_id), Some(plan_id)) => Ok((user_id, plan_id)),
			(None, _) => Err("missing user_id in session metadata".into()),
			(_, None) => Err("missing plan_id in session metadata".into()),
		},
	}
}

/// Make `plan` the user's only active subscription.
pub async fn activate_plan(
	conn: &mut PgConnection,
	user_id: i32,
	plan: &Plan,
	end_date: DateTime<Utc>,
	auto_renew: bool,
	stripe_subscription_id: Option<&str>,
) -> Result<Subscription, sqlx::Error> {
	let deactivated = subscription::deactivate_user_subscriptions(&mut *conn, user_id).await?;
	let subscription = subscription::insert_active_subscription(
		conn,
		user_id,
		plan.id,
		end_date,
		auto_renew,
		stripe_subscription_id,
	)
	.await?;

	log::debug!(
		target: "vectrahub",
		"Activated [plan_id={}] for [user_id={}] until [end_date={}], [deactivated={}]",
		plan.id,
		user_id,
		end_date,
		deactivated
	);

	Ok(subscription)
}

/// Reconcile a completed Checkout Session into a subscription, a payment and
/// coins. Everything happens in one transaction; on error nothing is written
/// and the caller answers 500 so Stripe redelivers.
pub async fn handle_checkout_completed(
	pool: &PgPool,
	session: &CheckoutSession,
	now: DateTime<Utc>,
) -> Result<CheckoutOutcome, VectraError> {
	let mut tx = pool.begin().await?;

	let order = checkout_order::get_order_for_update(&mut tx, &session.id).await?;
	if order.is_none() {
		log::warn!(
			target: "vectrahub",
			"No checkout order for [session={}], falling back to session metadata",
			session.id
		);
	}

	let (user_id, plan_id) = match resolve_purchase(session, order.as_ref()) {
		Ok(ids) => ids,
		Err(reason) => {
			log::warn!(target: "vectrahub", "Ignoring [session={}]: {}", session.id, reason);
			return Ok(CheckoutOutcome::Ignored(reason));
		}
	};

	// Deliveries for the same buyer queue up here, so a redelivery sees the
	// payment the first one wrote.
	if !user::lock_user(&mut tx, user_id).await? {
		let reason = format!("unknown user_id {}", user_id);
		log::warn!(target: "vectrahub", "Ignoring [session={}]: {}", session.id, reason);
		return Ok(CheckoutOutcome::Ignored(reason));
	}

	if payment::payment_exists(&mut *tx, &session.id).await? {
		log::info!(
			target: "vectrahub",
			"Checkout [session={}] already reconciled, skipping",
			session.id
		);
		return Ok(CheckoutOutcome::AlreadyProcessed);
	}

	let plan = match plan::get_plan(&mut *tx, plan_id).await? {
		Some(plan) => plan,
		None => {
			let reason = format!("unknown plan_id {}", plan_id);
			log::warn!(target: "vectrahub", "Ignoring [session={}]: {}", session.id, reason);
			return Ok(CheckoutOutcome::Ignored(reason));
		}
	};
	let end_date = expiration_for(plan.billing_period, now);
	let subscription = match activate_plan(
		&mut tx,
		user_id,
		&plan,
		end_date,
		true,
		session.subscription.as_deref(),
	)
	.await
	{
		Ok(subscription) => subscription,
		Err(e) if is_unique_violation(&e) => return Ok(CheckoutOutcome::AlreadyProcessed),
		Err(e) => return Err(e.into()),
	};

	let amount_cents = session
		.amount_total
		.or_else(|| order.as_ref().map(|o| o.amount_cents))
		.unwrap_or(plan.price_cents);
	match payment::insert_payment(&mut tx, user_id, plan.id, amount_cents, "stripe", &session.id).await {
		Ok(_) => {}
		// A concurrent delivery of the same event won the race.
		Err(e) if is_unique_violation(&e) => return Ok(CheckoutOutcome::AlreadyProcessed),
		Err(e) => return Err(e.into()),
	}

	if plan.coin_limit > 0 {
		ledger::credit(&mut tx, user_id, plan.coin_limit, CoinReason::SubscriptionPurchase).await?;
	}
	if let Some(order) = &order {
		checkout_order::complete_order(&mut tx, order.id).await?;
	}
	log_activity(
		&mut *tx,
		activity_log::SUBSCRIPTION_PURCHASED,
		&format!(
			"User {} purchased the {} plan for ${:.2}",
			user_id,
			plan.name,
			cents_to_dollars(amount_cents)
		),
		Some(user_id),
	)
	.await?;

	tx.commit().await?;

	log::info!(
		target: "vectrahub",
		"Reconciled checkout [session={}]: [user_id={}] now on [plan_id={}] until [end_date={}]",
		session.id,
		user_id,
		plan.id,
		end_date
	);

	Ok(CheckoutOutcome::Activated {
		user_id,
		plan_id: plan.id,
		subscription_id: subscription.id,
	})
}

/// A failed renewal switches the subscription off. Stripe retries the charge
/// on its own schedule, we don't.
pub async fn handle_payment_failed(pool: &PgPool, invoice: &Invoice) -> Result<usize, VectraError> {
	let stripe_subscription_id = match invoice.subscription.as_deref() {
		Some(id) => id,
		None => {
			log::info!(
				target: "vectrahub",
				"Payment failed for [invoice={}] without subscription, nothing to do",
				invoice.id
			);
			return Ok(0);
		}
	};

	let mut tx = pool.begin().await?;
	let user_ids =
		subscription::deactivate_by_stripe_id(&mut *tx, stripe_subscription_id, false).await?;
	for user_id in &user_ids {
		log_activity(
			&mut *tx,
			activity_log::PAYMENT_FAILED,
			&format!(
				"Payment failed for subscription {} (invoice {})",
				stripe_subscription_id, invoice.id
			),
			Some(*user_id),
		)
		.await?;
	}
	tx.commit().await?;

	if user_ids.is_empty() {
		log::warn!(
			target: "vectrahub",
			"Payment failed for unknown [stripe_subscription_id={}]",
			stripe_subscription_id
		);
	}

	Ok(user_ids.len())
}

/// A subscription cancelled on Stripe's side stops and will not renew.
pub async fn handle_subscription_deleted(
	pool: &PgPool,
	stripe_subscription: &SubscriptionObject,
) -> Result<usize, VectraError> {
	let mut tx = pool.begin().await?;
	let user_ids =
		subscription::deactivate_by_stripe_id(&mut *tx, &stripe_subscription.id, true).await?;
	for user_id in &user_ids {
		log_activity(
			&mut *tx,
			activity_log::SUBSCRIPTION_CANCELLED,
			&format!("Subscription {} cancelled", stripe_subscription.id),
			Some(*user_id),
		)
		.await?;
	}
	tx.commit().await?;

	if user_ids.is_empty() {
		log::warn!(
			target: "vectrahub",
			"Cancellation for unknown [stripe_subscription_id={}]",
			stripe_subscription.id
		);
	}

	Ok(user_ids.len())
}

/// Activate a zero-priced plan without going through Stripe, for one year.
/// The balance is topped up to the plan's coin allowance.
pub async fn activate_free_plan(
	pool: &PgPool,
	user_id: i32,
	plan: &Plan,
) -> Result<Subscription, VectraError> {
	if !plan.is_free() {
		return Err(VectraError::Validation("Plan is not free".into()));
	}

	let mut tx = pool.begin().await?;
	let end_date = expiration_for(BillingPeriod::Yearly, Utc::now());
	let subscription = activate_plan(&mut tx, user_id, plan, end_date, false, None).await?;
	ledger::top_up(&mut tx, user_id, plan.coin_limit, CoinReason::PlanGrant).await?;
	log_activity(
		&mut *tx,
		activity_log::FREE_PLAN_ACTIVATED,
		&format!("User {} activated the {} plan", user_id, plan.name),
		Some(user_id),
	)
	.await?;
	tx.commit().await?;

	Ok(subscription)
}

/// What redeeming a coupon granted.
#[derive(Debug)]
pub struct CouponRedemption {
	pub coupon_type: CouponType,
	pub plan: Plan,
	pub months: i32,
	pub subscription: Subscription,
}

/// Redeem a plan-granting coupon: the coupon's plan replaces the current
/// subscription for `free_duration_months`, and the balance is reset to the
/// plan's coin limit. Each user redeems a coupon once, and `max_uses` caps
/// redemptions across users.
pub async fn apply_coupon(
	pool: &PgPool,
	user_id: i32,
	code: &str,
	now: DateTime<Utc>,
) -> Result<CouponRedemption, VectraError> {
	let code = normalize_coupon_code(code);
	if code.is_empty() {
		return Err(VectraError::Validation("No coupon code provided".into()));
	}

	let mut tx = pool.begin().await?;
	if !user::lock_user(&mut tx, user_id).await? {
		return Err(VectraError::NotFound("User not found".into()));
	}
	let found = coupon::lock_valid_coupon(&mut tx, &code, now.date_naive())
		.await?
		.ok_or_else(|| VectraError::Validation("Invalid or expired coupon code".into()))?;
	if coupon::user_used_coupon(&mut *tx, user_id, found.id).await? {
		return Err(VectraError::Validation("You have already used this coupon".into()));
	}
	if !found.coupon_type.grants_plan() {
		return Err(VectraError::Validation(
			"Discount coupons cannot be redeemed for a plan".into(),
		));
	}

	let (plan_id, months) = match (found.free_plan_id, found.free_duration_months) {
		(Some(plan_id), Some(months)) if months > 0 => (plan_id, months),
		_ => {
			return Err(VectraError::Internal(format!(
				"Coupon {} grants no plan",
				found.code
			)))
		}
	};
	let plan = plan::get_plan(&mut *tx, plan_id)
		.await?
		.ok_or_else(|| VectraError::NotFound("Plan not found".into()))?;

	let end_date = months_after(now, months as u32);
	let subscription = activate_plan(&mut tx, user_id, &plan, end_date, false, None).await?;
	coupon::mark_subscription_from_coupon(&mut tx, subscription.id, found.id)
		.await
		.map_err(|e| {
			if is_unique_violation(&e) {
				VectraError::Validation("You have already used this coupon".into())
			} else {
				VectraError::from(e)
			}
		})?;
	ledger::set_balance(&mut tx, user_id, plan.coin_limit, CoinReason::Coupon).await?;
	coupon::increment_uses(&mut tx, found.id).await?;
	log_activity(
		&mut *tx,
		activity_log::COUPON_APPLIED,
		&format!(
			"User {} redeemed coupon {} for {} month(s) of the {} plan",
			user_id, found.code, months, plan.name
		),
		Some(user_id),
	)
	.await?;
	tx.commit().await?;

	log::info!(
		target: "vectrahub",
		"Redeemed [coupon={}] for [user_id={}]: [plan_id={}] until [end_date={}]",
		found.code,
		user_id,
		plan.id,
		end_date
	);

	Ok(CouponRedemption {
		coupon_type: found.coupon_type,
		plan,
		months,
		subscription,
	})
}

/// Deactivate subscriptions past their end date and purge old activity.
/// Returns the number of expired subscriptions.
pub async fn expire_overdue_subscriptions(pool: &PgPool) -> Result<usize, VectraError> {
	let mut tx = pool.begin().await?;
	let expired = subscription::expire_overdue(&mut *tx).await?;
	for sub in &expired {
		log_activity(
			&mut *tx,
			activity_log::SUBSCRIPTION_EXPIRED,
			&format!("Subscription {} expired on {}", sub.id, sub.end_date.format("%Y-%m-%d")),
			Some(sub.user_id),
		)
		.await?;
	}
	let purged = activity_log::purge_activity_older_than(&mut *tx, ACTIVITY_RETENTION_DAYS).await?;
	tx.commit().await?;

	log::info!(
		target: "vectrahub",
		"Expiry sweep done: [expired={}] [purged_activity={}]",
		expired.len(),
		purged
	);

	Ok(expired.len())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::checkout_order::OrderStatus;
	use chrono::TimeZone;

	fn session(metadata: serde_json::Value) -> CheckoutSession {
		serde_json::from_value(serde_json::json!({
			"id": "cs_test_1",
			"metadata": metadata,
		}))
		.unwrap()
	}

	fn order(user_id: i32, plan_id: i32) -> CheckoutOrder {
		CheckoutOrder {
			id: 1,
			stripe_session_id: "cs_test_1".into(),
			user_id,
			plan_id,
			amount_cents: 500,
			status: OrderStatus::Pending,
		}
	}

	#[test]
	fn test_monthly_expiration() {
		let from = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
		assert_eq!(
			expiration_for(BillingPeriod::Monthly, from),
			Utc.with_ymd_and_hms(2024, 4, 15, 10, 0, 0).unwrap()
		);
	}

	#[test]
	fn test_yearly_expiration() {
		let from = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
		assert_eq!(
			expiration_for(BillingPeriod::Yearly, from),
			Utc.with_ymd_and_hms(2025, 3, 15, 10, 0, 0).unwrap()
		);
	}

	#[test]
	fn test_month_end_is_clamped() {
		let from = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
		assert_eq!(
			expiration_for(BillingPeriod::Monthly, from),
			Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()
		);
	}

	#[test]
	fn test_coupon_duration_in_months() {
		let from = Utc.with_ymd_and_hms(2024, 8, 31, 12, 0, 0).unwrap();
		assert_eq!(months_after(from, 6), Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap());
		assert_eq!(months_after(from, 12), Utc.with_ymd_and_hms(2025, 8, 31, 12, 0, 0).unwrap());
	}

	#[test]
	fn test_resolve_from_metadata() {
		let s = session(serde_json::json!({"user_id": "42", "plan_id": "9"}));
		assert_eq!(resolve_purchase(&s, None), Ok((42, 9)));
	}

	#[test]
	fn test_resolve_missing_metadata() {
		let s = session(serde_json::json!({"plan_id": "9"}));
		assert!(resolve_purchase(&s, None).is_err());

		let s = session(serde_json::json!({"user_id": "42"}));
		assert!(resolve_purchase(&s, None).is_err());
	}

	#[test]
	fn test_order_is_authoritative() {
		let s = session(serde_json::json!({}));
		assert_eq!(resolve_purchase(&s, Some(&order(42, 9))), Ok((42, 9)));

		let s = session(serde_json::json!({"user_id": "42", "plan_id": "9"}));
		assert_eq!(resolve_purchase(&s, Some(&order(42, 9))), Ok((42, 9)));
	}

	#[test]
	fn test_tampered_metadata_is_refused() {
		let s = session(serde_json::json!({"user_id": "42", "plan_id": "3"}));
		assert!(resolve_purchase(&s, Some(&order(42, 9))).is_err());

		let s = session(serde_json::json!({"user_id": "1", "plan_id": "9"}));
		assert!(resolve_purchase(&s, Some(&order(42, 9))).is_err());
	}
}
