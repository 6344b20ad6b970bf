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


//! This file implements the `GET /api/billing` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::{
	cents_to_dollars,
	payment::{list_user_payments, Payment},
	subscription::{get_active_subscription, SubscriptionDetails},
};
use crate::session::{with_session, Session};
use serde::Serialize;
use warp::Filter;

#[derive(Debug, Serialize)]
struct BillingResponse {
	coins: i32,
	subscription: Option<SubscriptionDetails>,
	payments: Vec<Payment>,
	total_spent: f64,
	stripe_publishable_key: String,
}

async fn billing(
	session: Session,
	pool: PgPool,
	config: SharedConfig,
) -> Result<impl warp::Reply, warp::Rejection> {
	let user_id = session.user_id();
	let subscription = get_active_subscription(&pool, user_id)
		.await
		.map_err(VectraError::from)?;
	let payments = list_user_payments(&pool, user_id)
		.await
		.map_err(VectraError::from)?;
	let total_spent = cents_to_dollars(payments.iter().map(|p| p.amount_cents).sum());

	Ok(warp::reply::json(&BillingResponse {
		coins: session.user.coins,
		subscription,
		payments,
		total_spent,
		stripe_publishable_key: config.stripe_publishable_key.clone(),
	}))
}

/// `GET /api/billing` endpoint.
pub fn get_billing(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "billing")
		.and(warp::get())
		.and(with_session(pool.clone(), config.clone()))
		.and_then(move |session| billing(session, pool.clone(), config.clone()))
		.with(warp::log("vectrahub"))
}
