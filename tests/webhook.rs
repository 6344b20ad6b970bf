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

use common::{
	create_test_plan, create_test_user, lazy_pool, random_suffix, setup_pool, stripe_signature,
	teardown, test_routes,
};
use chrono::Utc;
use serde_json::json;
use vectrahub_backend::{
	billing::{self, CheckoutOutcome},
	db::PgPool,
	ledger,
	models::{
		checkout_order::insert_order, payment::list_user_payments,
		subscription::get_active_subscription,
	},
	stripe::{CheckoutSession, STRIPE_SIGNATURE_HEADER},
};
use warp::http::StatusCode;
use warp::test::request;

fn checkout_completed(session_id: &str, user_id: i32, plan_id: i32, amount: i64) -> String {
	json!({
		"id": format!("evt_{}", random_suffix()),
		"type": "checkout.session.completed",
		"data": {"object": {
			"id": session_id,
			"object": "checkout.session",
			"amount_total": amount,
			"client_reference_id": user_id.to_string(),
			"metadata": {"user_id": user_id.to_string(), "plan_id": plan_id.to_string()},
			"subscription": format!("sub_{}", session_id)
		}}
	})
	.to_string()
}

/// Deliver a correctly signed event through the full API.
async fn deliver(pool: &PgPool, payload: &str) -> StatusCode {
	request()
		.path("/webhook/stripe")
		.method("POST")
		.header(STRIPE_SIGNATURE_HEADER, stripe_signature(payload))
		.body(payload)
		.reply(&test_routes(pool.clone()))
		.await
		.status()
}

/// Subscription rows of a user as `(plan_id, active, auto_renew)`, oldest
/// first.
async fn subscription_rows(pool: &PgPool, user_id: i32) -> Vec<(i32, bool, bool)> {
	sqlx::query_as("SELECT plan_id, active, auto_renew FROM user_subscriptions WHERE user_id = $1 ORDER BY id")
		.bind(user_id)
		.fetch_all(pool)
		.await
		.unwrap()
}

#[tokio::test]
async fn test_missing_signature() {
	let resp = request()
		.path("/webhook/stripe")
		.method("POST")
		.body(r#"{"id":"evt_1","type":"checkout.session.completed"}"#)
		.reply(&test_routes(lazy_pool()))
		.await;

	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	assert_eq!(
		resp.body(),
		r#"{"success":false,"error":"Invalid signature"}"#
	);
}

#[tokio::test]
async fn test_wrong_signature() {
	let payload = r#"{"id":"evt_1","type":"checkout.session.completed"}"#;
	let resp = request()
		.path("/webhook/stripe")
		.method("POST")
		.header(STRIPE_SIGNATURE_HEADER, stripe_signature(r#"{"id":"evt_2"}"#))
		.body(payload)
		.reply(&test_routes(lazy_pool()))
		.await;

	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	assert_eq!(
		resp.body(),
		r#"{"success":false,"error":"Invalid signature"}"#
	);
}

#[tokio::test]
async fn test_empty_payload() {
	let resp = request()
		.path("/webhook/stripe")
		.method("POST")
		.header(STRIPE_SIGNATURE_HEADER, stripe_signature(""))
		.body("")
		.reply(&test_routes(lazy_pool()))
		.await;

	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	assert_eq!(resp.body(), r#"{"success":false,"error":"Empty payload"}"#);
}

#[tokio::test]
async fn test_signed_garbage_is_invalid_payload() {
	let payload = "not json";
	let resp = request()
		.path("/webhook/stripe")
		.method("POST")
		.header(STRIPE_SIGNATURE_HEADER, stripe_signature(payload))
		.body(payload)
		.reply(&test_routes(lazy_pool()))
		.await;

	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	assert_eq!(resp.body(), r#"{"success":false,"error":"Invalid payload"}"#);
}

#[tokio::test]
async fn test_unhandled_event_is_acknowledged() {
	let payload = r#"{"id":"evt_1","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
	let resp = request()
		.path("/webhook/stripe")
		.method("POST")
		.header(STRIPE_SIGNATURE_HEADER, stripe_signature(payload))
		.body(payload)
		.reply(&test_routes(lazy_pool()))
		.await;

	assert_eq!(resp.status(), StatusCode::OK);
	assert_eq!(resp.body(), r#"{"received":true}"#);
}

#[tokio::test]
async fn test_checkout_completed_activates_plan_once() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let user = create_test_user(&pool).await;
	let plan = create_test_plan(&pool, 500, 40).await;
	let session_id = format!("cs_test_{}", random_suffix());
	let payload = checkout_completed(&session_id, user.id, plan.id, 500);

	// The second delivery is a replay of the first one.
	for _ in 0..2 {
		let resp = request()
			.path("/webhook/stripe")
			.method("POST")
			.header(STRIPE_SIGNATURE_HEADER, stripe_signature(&payload))
			.body(&payload)
			.reply(&test_routes(pool.clone()))
			.await;
		assert_eq!(resp.status(), StatusCode::OK, "{:?}", resp.body());
	}

	let subscription = get_active_subscription(&pool, user.id)
		.await
		.unwrap()
		.expect("User has an active subscription");
	assert_eq!(subscription.plan_id, plan.id);
	assert!(subscription.end_date > subscription.start_date);

	let payments = list_user_payments(&pool, user.id).await.unwrap();
	assert_eq!(payments.len(), 1);
	assert_eq!(payments[0].amount_cents, 500);
	assert_eq!(payments[0].transaction_id, session_id);

	assert_eq!(ledger::balance(&pool, user.id).await.unwrap(), 40);

	teardown(&pool, &[user.id], &[plan.id]).await;
}

#[tokio::test]
async fn test_checkout_for_unknown_user_is_ignored() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let plan = create_test_plan(&pool, 500, 40).await;
	let session_id = format!("cs_test_{}", random_suffix());
	let payload = checkout_completed(&session_id, i32::MAX, plan.id, 500);

	let resp = request()
		.path("/webhook/stripe")
		.method("POST")
		.header(STRIPE_SIGNATURE_HEADER, stripe_signature(&payload))
		.body(&payload)
		.reply(&test_routes(pool.clone()))
		.await;

	assert_eq!(resp.status(), StatusCode::OK);
	assert_eq!(resp.body(), r#"{"received":true}"#);

	teardown(&pool, &[], &[plan.id]).await;
}

#[tokio::test]
async fn test_payment_failed_deactivates_subscription() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let user = create_test_user(&pool).await;
	let plan = create_test_plan(&pool, 999, 100).await;
	let session_id = format!("cs_test_{}", random_suffix());
	let checkout = checkout_completed(&session_id, user.id, plan.id, 999);

	let resp = request()
		.path("/webhook/stripe")
		.method("POST")
		.header(STRIPE_SIGNATURE_HEADER, stripe_signature(&checkout))
		.body(&checkout)
		.reply(&test_routes(pool.clone()))
		.await;
	assert_eq!(resp.status(), StatusCode::OK);

	let failed = json!({
		"id": format!("evt_{}", random_suffix()),
		"type": "invoice.payment_failed",
		"data": {"object": {"id": "in_test", "subscription": format!("sub_{}", session_id)}}
	})
	.to_string();
	let resp = request()
		.path("/webhook/stripe")
		.method("POST")
		.header(STRIPE_SIGNATURE_HEADER, stripe_signature(&failed))
		.body(&failed)
		.reply(&test_routes(pool.clone()))
		.await;
	assert_eq!(resp.status(), StatusCode::OK);

	assert!(get_active_subscription(&pool, user.id).await.unwrap().is_none());

	teardown(&pool, &[user.id], &[plan.id]).await;
}

#[tokio::test]
async fn test_concurrent_deliveries_reconcile_once() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let user = create_test_user(&pool).await;
	let plan = create_test_plan(&pool, 500, 40).await;

	for round in 0..5 {
		let session: CheckoutSession = serde_json::from_value(json!({
			"id": format!("cs_race_{}_{}", round, random_suffix()),
			"metadata": {"user_id": user.id.to_string(), "plan_id": plan.id.to_string()},
			"amount_total": 500,
		}))
		.unwrap();

		let (first, second) = tokio::join!(
			billing::handle_checkout_completed(&pool, &session, Utc::now()),
			billing::handle_checkout_completed(&pool, &session, Utc::now()),
		);
		let outcomes = [first.unwrap(), second.unwrap()];
		let activated = outcomes
			.iter()
			.filter(|o| matches!(o, CheckoutOutcome::Activated { .. }))
			.count();
		assert_eq!(activated, 1, "{:?}", outcomes);
		assert!(outcomes.contains(&CheckoutOutcome::AlreadyProcessed));
	}

	assert_eq!(list_user_payments(&pool, user.id).await.unwrap().len(), 5);
	let rows = subscription_rows(&pool, user.id).await;
	assert_eq!(rows.iter().filter(|(_, active, _)| *active).count(), 1);
	assert_eq!(ledger::balance(&pool, user.id).await.unwrap(), 5 * 40);

	teardown(&pool, &[user.id], &[plan.id]).await;
}

#[tokio::test]
async fn test_new_purchase_replaces_previous_subscription() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let user = create_test_user(&pool).await;
	let basic = create_test_plan(&pool, 999, 100).await;
	let pro = create_test_plan(&pool, 2999, 500).await;

	let first = checkout_completed(&format!("cs_test_{}", random_suffix()), user.id, basic.id, 999);
	assert_eq!(deliver(&pool, &first).await, StatusCode::OK);
	let second = checkout_completed(&format!("cs_test_{}", random_suffix()), user.id, pro.id, 2999);
	assert_eq!(deliver(&pool, &second).await, StatusCode::OK);

	let rows = subscription_rows(&pool, user.id).await;
	assert_eq!(rows.len(), 2);
	assert_eq!(rows[0].0, basic.id);
	assert!(!rows[0].1, "the earlier subscription is no longer active");
	assert_eq!(rows[1].0, pro.id);
	assert!(rows[1].1);

	let active = get_active_subscription(&pool, user.id).await.unwrap().unwrap();
	assert_eq!(active.plan_id, pro.id);

	teardown(&pool, &[user.id], &[basic.id, pro.id]).await;
}

#[tokio::test]
async fn test_badly_signed_checkout_changes_nothing() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let user = create_test_user(&pool).await;
	let plan = create_test_plan(&pool, 500, 40).await;
	let payload = checkout_completed(&format!("cs_test_{}", random_suffix()), user.id, plan.id, 500);

	let resp = request()
		.path("/webhook/stripe")
		.method("POST")
		.header(STRIPE_SIGNATURE_HEADER, stripe_signature(r#"{"id":"evt_other"}"#))
		.body(&payload)
		.reply(&test_routes(pool.clone()))
		.await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

	assert!(subscription_rows(&pool, user.id).await.is_empty());
	assert!(list_user_payments(&pool, user.id).await.unwrap().is_empty());
	assert_eq!(ledger::balance(&pool, user.id).await.unwrap(), 0);

	teardown(&pool, &[user.id], &[plan.id]).await;
}

#[tokio::test]
async fn test_subscription_deleted_cancels_renewal() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let user = create_test_user(&pool).await;
	let plan = create_test_plan(&pool, 999, 100).await;
	let session_id = format!("cs_test_{}", random_suffix());
	let checkout = checkout_completed(&session_id, user.id, plan.id, 999);
	assert_eq!(deliver(&pool, &checkout).await, StatusCode::OK);

	let deleted = json!({
		"id": format!("evt_{}", random_suffix()),
		"type": "customer.subscription.deleted",
		"data": {"object": {"id": format!("sub_{}", session_id), "object": "subscription"}}
	})
	.to_string();
	assert_eq!(deliver(&pool, &deleted).await, StatusCode::OK);

	assert_eq!(subscription_rows(&pool, user.id).await, vec![(plan.id, false, false)]);

	teardown(&pool, &[user.id], &[plan.id]).await;
}

#[tokio::test]
async fn test_checkout_order_outranks_session_metadata() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let user = create_test_user(&pool).await;
	let cheap = create_test_plan(&pool, 500, 40).await;
	let pricey = create_test_plan(&pool, 2999, 500).await;

	// Metadata naming another plan than the one ordered is refused.
	let tampered_id = format!("cs_test_{}", random_suffix());
	insert_order(&pool, &tampered_id, user.id, cheap.id, 500).await.unwrap();
	let tampered = checkout_completed(&tampered_id, user.id, pricey.id, 500);
	assert_eq!(deliver(&pool, &tampered).await, StatusCode::OK);
	assert!(subscription_rows(&pool, user.id).await.is_empty());
	assert!(list_user_payments(&pool, user.id).await.unwrap().is_empty());

	// Without metadata the order alone decides.
	let session_id = format!("cs_test_{}", random_suffix());
	insert_order(&pool, &session_id, user.id, cheap.id, 500).await.unwrap();
	let bare = json!({
		"id": format!("evt_{}", random_suffix()),
		"type": "checkout.session.completed",
		"data": {"object": {"id": session_id, "object": "checkout.session", "amount_total": 500}}
	})
	.to_string();
	assert_eq!(deliver(&pool, &bare).await, StatusCode::OK);

	let active = get_active_subscription(&pool, user.id).await.unwrap().unwrap();
	assert_eq!(active.plan_id, cheap.id);
	assert_eq!(ledger::balance(&pool, user.id).await.unwrap(), 40);

	teardown(&pool, &[user.id], &[cheap.id, pricey.id]).await;
}
