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

use common::{lazy_pool, random_suffix, setup_pool, teardown, test_routes};
use serde_json::{json, Value};
use vectrahub_backend::{
	db::PgPool,
	ledger::{self, AD_VIEW_REWARD, MAX_AD_VIEWS_PER_DAY, REFERRAL_SIGNUP_BONUS},
	models::{referral::get_referral_code, user::get_user_by_email},
	session::{CSRF_HEADER, SESSION_COOKIE},
};
use warp::http::{header::SET_COOKIE, StatusCode};
use warp::test::request;

const PASSWORD: &str = "Vectra#2024";

fn body_json(body: &[u8]) -> Value {
	serde_json::from_slice(body).expect("Response body is JSON. qed.")
}

/// Register an account and return its id.
async fn register(pool: &PgPool, email: &str, referral_code: Option<&str>) -> i32 {
	let resp = request()
		.path("/api/auth/register")
		.method("POST")
		.json(&json!({
			"full_name": "Jane Tester",
			"email": email,
			"password": PASSWORD,
			"confirm_password": PASSWORD,
			"referral_code": referral_code,
		}))
		.reply(&test_routes(pool.clone()))
		.await;
	assert_eq!(resp.status(), StatusCode::CREATED, "{:?}", resp.body());

	body_json(resp.body())["user"]["id"]
		.as_i64()
		.expect("Registered user has an id") as i32
}

/// Log in and return the `Cookie` header value, plus a CSRF token bound to
/// that session.
async fn login(pool: &PgPool, email: &str) -> (String, String) {
	let resp = request()
		.path("/api/auth/login")
		.method("POST")
		.json(&json!({ "email": email, "password": PASSWORD }))
		.reply(&test_routes(pool.clone()))
		.await;
	assert_eq!(resp.status(), StatusCode::OK, "{:?}", resp.body());

	let set_cookie = resp
		.headers()
		.get(SET_COOKIE)
		.expect("Login sets the session cookie")
		.to_str()
		.unwrap();
	let cookie = set_cookie.split(';').next().unwrap().to_string();
	assert!(cookie.starts_with(&format!("{}=", SESSION_COOKIE)));

	let resp = request()
		.path("/api/auth/csrf-token")
		.header("cookie", &cookie)
		.reply(&test_routes(pool.clone()))
		.await;
	assert_eq!(resp.status(), StatusCode::OK);
	let csrf = body_json(resp.body())["csrf_token"]
		.as_str()
		.expect("CSRF token is a string")
		.to_string();

	(cookie, csrf)
}

#[tokio::test]
async fn test_version() {
	let resp = request()
		.path("/version")
		.reply(&test_routes(lazy_pool()))
		.await;

	assert_eq!(resp.status(), StatusCode::OK);
	assert_eq!(
		body_json(resp.body()),
		json!({ "version": env!("CARGO_PKG_VERSION") })
	);
}

#[tokio::test]
async fn test_me_requires_login() {
	let resp = request()
		.path("/api/auth/me")
		.reply(&test_routes(lazy_pool()))
		.await;

	assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(resp.body(), r#"{"success":false,"error":"Not logged in"}"#);
}

#[tokio::test]
async fn test_unknown_route() {
	let resp = request()
		.path("/api/nope")
		.reply(&test_routes(lazy_pool()))
		.await;

	assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
	let resp = request()
		.path("/api/auth/register")
		.method("POST")
		.json(&json!({
			"full_name": "Jane Tester",
			"email": "jane@vectrahub.test",
			"password": "password",
			"confirm_password": "password",
		}))
		.reply(&test_routes(lazy_pool()))
		.await;

	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_registration_grants_free_plan_and_referral_bonus() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let referrer_email = format!("referrer_{}@vectrahub.test", random_suffix());
	let referrer_id = register(&pool, &referrer_email, None).await;
	let starting_balance = ledger::balance(&pool, referrer_id).await.unwrap();

	let code = get_referral_code(&pool, referrer_id)
		.await
		.unwrap()
		.expect("Every account gets a referral code");
	let referred_email = format!("referred_{}@vectrahub.test", random_suffix());
	let referred_id = register(&pool, &referred_email, Some(&code)).await;

	assert_eq!(
		ledger::balance(&pool, referrer_id).await.unwrap(),
		starting_balance + REFERRAL_SIGNUP_BONUS
	);

	// Same email again.
	let resp = request()
		.path("/api/auth/register")
		.method("POST")
		.json(&json!({
			"full_name": "Jane Tester",
			"email": referred_email,
			"password": PASSWORD,
			"confirm_password": PASSWORD,
		}))
		.reply(&test_routes(pool.clone()))
		.await;
	assert_eq!(resp.status(), StatusCode::CONFLICT);

	teardown(&pool, &[referrer_id, referred_id], &[]).await;
}

#[tokio::test]
async fn test_ad_views_are_capped_per_day() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let email = format!("ads_{}@vectrahub.test", random_suffix());
	let user_id = register(&pool, &email, None).await;
	let (cookie, csrf) = login(&pool, &email).await;
	let starting_balance = ledger::balance(&pool, user_id).await.unwrap();

	// Without the CSRF header.
	let resp = request()
		.path("/api/ad-view")
		.method("POST")
		.header("cookie", &cookie)
		.reply(&test_routes(pool.clone()))
		.await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

	for view in 1..=MAX_AD_VIEWS_PER_DAY {
		let resp = request()
			.path("/api/ad-view")
			.method("POST")
			.header("cookie", &cookie)
			.header(CSRF_HEADER, &csrf)
			.reply(&test_routes(pool.clone()))
			.await;
		assert_eq!(resp.status(), StatusCode::OK, "{:?}", resp.body());
		let body = body_json(resp.body());
		assert_eq!(body["current_views"], json!(view));
		assert_eq!(body["coins_awarded"], json!(AD_VIEW_REWARD));
	}

	let resp = request()
		.path("/api/ad-view")
		.method("POST")
		.header("cookie", &cookie)
		.header(CSRF_HEADER, &csrf)
		.reply(&test_routes(pool.clone()))
		.await;
	assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	assert_eq!(
		resp.body(),
		r#"{"success":false,"error":"Daily ad view limit reached"}"#
	);

	let user = get_user_by_email(&pool, &email).await.unwrap().unwrap();
	assert_eq!(
		user.coins,
		starting_balance + AD_VIEW_REWARD * MAX_AD_VIEWS_PER_DAY as i32
	);

	teardown(&pool, &[user_id], &[]).await;
}
