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


mod common;

use chrono::{Duration, Utc};
use common::{create_test_plan, create_test_user, random_suffix, setup_pool, teardown};
use vectrahub_backend::{
	billing::apply_coupon,
	db::PgPool,
	errors::VectraError,
	ledger,
	models::{
		coupon::{delete_coupon, get_valid_coupon, insert_coupon, CouponType, NewCoupon},
		subscription::get_active_subscription,
	},
};

async fn free_plan_coupon(pool: &PgPool, plan_id: i32, max_uses: Option<i32>) -> String {
	let code = format!("FREE{}", random_suffix()).to_uppercase();
	let today = Utc::now().date_naive();
	insert_coupon(
		pool,
		&NewCoupon {
			code: &code,
			coupon_type: CouponType::FreePlan,
			description: Some("Three months on us"),
			discount_percent: None,
			discount_amount_cents: None,
			free_plan_id: Some(plan_id),
			free_duration_months: Some(3),
			valid_from: today - Duration::days(1),
			valid_until: today + Duration::days(30),
			max_uses,
		},
	)
	.await
	.expect("Insert coupon shouldn't error. qed.");

	code
}

fn validation_message<T: std::fmt::Debug>(result: Result<T, VectraError>) -> String {
	match result {
		Err(VectraError::Validation(message)) => message,
		other => panic!("Expected a validation error, got {:?}", other),
	}
}

#[tokio::test]
async fn test_coupon_grants_plan_once_per_user() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let user = create_test_user(&pool).await;
	let plan = create_test_plan(&pool, 2999, 500).await;
	let code = free_plan_coupon(&pool, plan.id, None).await;

	// Codes are matched case-insensitively, surrounding blanks ignored.
	let now = Utc::now();
	let redemption = apply_coupon(&pool, user.id, &format!("  {}  ", code.to_lowercase()), now)
		.await
		.unwrap();
	assert_eq!(redemption.plan.id, plan.id);
	assert_eq!(redemption.months, 3);

	let active = get_active_subscription(&pool, user.id).await.unwrap().unwrap();
	assert_eq!(active.plan_id, plan.id);
	assert!(active.end_date > now + Duration::days(85));
	assert_eq!(ledger::balance(&pool, user.id).await.unwrap(), 500);

	assert_eq!(
		validation_message(apply_coupon(&pool, user.id, &code, Utc::now()).await),
		"You have already used this coupon"
	);

	let coupon = get_valid_coupon(&pool, &code, Utc::now().date_naive())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(coupon.current_uses, 1);

	teardown(&pool, &[user.id], &[plan.id]).await;
}

#[tokio::test]
async fn test_coupon_stops_at_max_uses() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let first = create_test_user(&pool).await;
	let second = create_test_user(&pool).await;
	let plan = create_test_plan(&pool, 999, 100).await;
	let code = free_plan_coupon(&pool, plan.id, Some(1)).await;

	apply_coupon(&pool, first.id, &code, Utc::now()).await.unwrap();
	assert_eq!(
		validation_message(apply_coupon(&pool, second.id, &code, Utc::now()).await),
		"Invalid or expired coupon code"
	);
	assert!(get_active_subscription(&pool, second.id).await.unwrap().is_none());

	teardown(&pool, &[first.id, second.id], &[plan.id]).await;
}

#[tokio::test]
async fn test_unredeemable_coupons_are_refused() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let user = create_test_user(&pool).await;
	let plan = create_test_plan(&pool, 999, 100).await;
	let code = free_plan_coupon(&pool, plan.id, None).await;

	assert_eq!(
		validation_message(apply_coupon(&pool, user.id, "   ", Utc::now()).await),
		"No coupon code provided"
	);

	// Past its validity window.
	let later = Utc::now() + Duration::days(60);
	assert_eq!(
		validation_message(apply_coupon(&pool, user.id, &code, later).await),
		"Invalid or expired coupon code"
	);

	let today = Utc::now().date_naive();
	let discount_code = format!("OFF{}", random_suffix()).to_uppercase();
	let discount_id = insert_coupon(
		&pool,
		&NewCoupon {
			code: &discount_code,
			coupon_type: CouponType::Discount,
			description: None,
			discount_percent: Some(20),
			discount_amount_cents: None,
			free_plan_id: None,
			free_duration_months: None,
			valid_from: today,
			valid_until: today + Duration::days(30),
			max_uses: None,
		},
	)
	.await
	.unwrap();
	assert_eq!(
		validation_message(apply_coupon(&pool, user.id, &discount_code, Utc::now()).await),
		"Discount coupons cannot be redeemed for a plan"
	);
	assert!(get_active_subscription(&pool, user.id).await.unwrap().is_none());

	assert!(delete_coupon(&pool, discount_id).await.unwrap());
	teardown(&pool, &[user.id], &[plan.id]).await;
}
