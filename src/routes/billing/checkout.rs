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


//! This file implements the `POST /api/checkout` endpoint.
//!
//! Zero-priced plans are activated right away. Paid plans get a Stripe
//! Checkout Session, and the subscription is only created once Stripe calls
//! the webhook back.

use crate::billing::activate_free_plan;
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::{checkout_order::insert_order, plan::get_plan};
use crate::routes::json_body;
use crate::session::{with_csrf_session, Session};
use crate::stripe::StripeClient;
use serde::{Deserialize, Serialize};
use warp::Filter;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CheckoutRequest {
	pub plan_id: i32,
}

async fn checkout(
	session: Session,
	body: CheckoutRequest,
	pool: PgPool,
	config: SharedConfig,
	stripe: StripeClient,
) -> Result<impl warp::Reply, warp::Rejection> {
	let user_id = session.user_id();
	let plan = get_plan(&pool, body.plan_id)
		.await
		.map_err(VectraError::from)?
		.filter(|plan| plan.active)
		.ok_or_else(|| VectraError::NotFound("Plan not found".into()))?;

	if plan.is_free() {
		let subscription = activate_free_plan(&pool, user_id, &plan).await?;
		log::info!(
			target: "vectrahub",
			"Activated free [plan_id={}] for [user_id={}]",
			plan.id,
			user_id
		);

		return Ok(warp::reply::json(&serde_json::json!({
			"success": true,
			"message": "Free plan activated successfully",
			"subscription": subscription,
		})));
	}

	let created = stripe.create_checkout_session(&plan, user_id, &config.app_url).await?;
	insert_order(&pool, &created.id, user_id, plan.id, plan.price_cents)
		.await
		.map_err(|e| {
			log::error!(
				target: "vectrahub",
				"Failed to store checkout order for [session={}] with [error={}]",
				created.id,
				e
			);
			VectraError::from(e)
		})?;

	log::info!(
		target: "vectrahub",
		"Created checkout [session={}] for [plan_id={}] [user_id={}]",
		created.id,
		plan.id,
		user_id
	);

	Ok(warp::reply::json(&serde_json::json!({
		"success": true,
		"session_id": created.id,
		"url": created.url,
	})))
}

/// `POST /api/checkout` endpoint.
pub fn post_checkout(
	pool: PgPool,
	config: SharedConfig,
	stripe: StripeClient,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "checkout")
		.and(warp::post())
		.and(with_csrf_session(pool.clone(), config.clone()))
		.and(json_body())
		.and_then(move |session, body| {
			checkout(session, body, pool.clone(), config.clone(), stripe.clone())
		})
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}
