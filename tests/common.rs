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


#![allow(dead_code)]

use rand::{distributions::Alphanumeric, Rng};
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc};
use vectrahub_backend::{
	config::Config,
	db::{connect_db, PgPool},
	models::{
		plan::{BillingPeriod, Plan},
		user::{create_user, delete_user, User},
	},
	routes::create_routes,
	stripe::{signature::compute_signature, StripeClient},
	vectorizer::VectorizerClient,
};
use warp::Filter;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_vectrahub_tests";

/// Configuration shared by all integration tests.
pub fn test_config() -> Config {
	Config {
		stripe_webhook_secret: TEST_WEBHOOK_SECRET.into(),
		database_url: env::var("DATABASE_URL").unwrap_or_default(),
		..Config::default()
	}
}

/// A pool that never connects until a query runs. Enough for routes that
/// reject before touching the database.
pub fn lazy_pool() -> PgPool {
	PgPoolOptions::new()
		.max_connections(1)
		.connect_lazy("postgres://localhost/vectrahub_unused")
		.expect("Lazy pool creation does not connect. qed.")
}

/// Connect to `DATABASE_URL` and run migrations. Returns `None` when the
/// variable is unset, so database tests are skipped on machines without
/// Postgres.
pub async fn setup_pool() -> Option<PgPool> {
	let config = test_config();
	if config.database_url.is_empty() {
		println!("DATABASE_URL is not set, skipping database test");
		return None;
	}

	Some(
		connect_db(&config)
			.await
			.expect("DATABASE_URL is expected to point to a usable database. qed."),
	)
}

/// The full API, wired the same way as the binary.
pub fn test_routes(
	pool: PgPool,
) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
	let config = test_config();
	let vectorizer = VectorizerClient::new(&config.python_api_url)
		.expect("Vectorizer client builds without I/O. qed.");
	let stripe = StripeClient::new(&config).expect("Stripe client builds without I/O. qed.");

	create_routes(pool, Arc::new(config), vectorizer, stripe)
}

/// Value of the `Stripe-Signature` header for `payload`, signed now.
pub fn stripe_signature(payload: &str) -> String {
	let timestamp = chrono::Utc::now().timestamp();
	format!(
		"t={},v1={}",
		timestamp,
		compute_signature(TEST_WEBHOOK_SECRET, timestamp, payload.as_bytes())
	)
}

pub fn random_suffix() -> String {
	rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(10)
		.map(char::from)
		.collect::<String>()
		.to_lowercase()
}

/// Create a random user with no subscription and no coins.
pub async fn create_test_user(pool: &PgPool) -> User {
	let mut conn = pool.acquire().await.expect("Pool has a connection. qed.");
	let email = format!("test_{}@vectrahub.test", random_suffix());

	create_user(&mut conn, "Test User", &email, "not-a-real-hash")
		.await
		.unwrap_or_else(|e| panic!("Create user {} shouldn't error: {}", email, e))
}

/// Create a monthly paid plan with a random name.
pub async fn create_test_plan(pool: &PgPool, price_cents: i64, coin_limit: i32) -> Plan {
	sqlx::query_as::<_, Plan>(
		r#"
		INSERT INTO subscription_plans (name, price_cents, coin_limit, billing_period, features)
		VALUES ($1, $2, $3, $4, 'test plan')
		RETURNING id, name, price_cents, coin_limit, billing_period, stripe_price_id, features, active
		"#,
	)
	.bind(format!("Test {}", random_suffix()))
	.bind(price_cents)
	.bind(coin_limit)
	.bind(BillingPeriod::Monthly)
	.fetch_one(pool)
	.await
	.expect("Create plan shouldn't error. qed.")
}

/// Clean up the database after a test. Cascading removes the users'
/// subscriptions, payments and ledger rows.
pub async fn teardown(pool: &PgPool, user_ids: &[i32], plan_ids: &[i32]) {
	for user_id in user_ids {
		delete_user(pool, *user_id)
			.await
			.unwrap_or_else(|e| panic!("User {} can be deleted: {}", user_id, e));
	}
	for plan_id in plan_ids {
		sqlx::query("DELETE FROM subscription_plans WHERE id = $1")
			.bind(plan_id)
			.execute(pool)
			.await
			.unwrap_or_else(|e| panic!("Plan {} can be deleted: {}", plan_id, e));
	}
}
