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

//! This file implements the `POST /webhook/stripe` endpoint.
//!
//! Nothing is read from or written to the database before the signature has
//! been verified. A handler error answers 500, so Stripe delivers the event
//! again later.

use crate::billing::{self, CheckoutOutcome};
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::stripe::{signature::DEFAULT_TOLERANCE_SECS, verify_signature, WebhookEvent, STRIPE_SIGNATURE_HEADER};
use bytes::Bytes;
use serde::Serialize;
use sqlx::types::chrono::Utc;
use warp::Filter;

/// Stripe caps event payloads well below this.
const WEBHOOK_BODY_LIMIT: u64 = 1024 * 512;

#[derive(Debug, Serialize)]
struct WebhookResponse {
	received: bool,
}

async fn stripe_webhook(
	body: Bytes,
	signature: Option<String>,
	pool: PgPool,
	config: SharedConfig,
) -> Result<impl warp::Reply, warp::Rejection> {
	if body.is_empty() {
		return Err(VectraError::Validation("Empty payload".into()).into());
	}
	if config.stripe_webhook_secret.is_empty() {
		log::error!(target: "vectrahub", "Received a Stripe webhook but STRIPE_WEBHOOK_SECRET is not set");
		return Err(VectraError::Internal("Webhook secret not configured".into()).into());
	}

	let now = Utc::now().timestamp();
	if let Err(e) = verify_signature(
		&body,
		signature.as_deref().unwrap_or_default(),
		&config.stripe_webhook_secret,
		now,
		DEFAULT_TOLERANCE_SECS,
	) {
		log::warn!(target: "vectrahub", "Refused Stripe webhook with [error={}]", e);
		return Err(VectraError::Validation("Invalid signature".into()).into());
	}

	let (event_id, event) = WebhookEvent::parse(&body).map_err(|e| {
		log::warn!(target: "vectrahub", "Unparsable Stripe webhook with [error={}]", e);
		VectraError::Validation("Invalid payload".into())
	})?;

	dispatch(&pool, &event_id, event).await?;

	Ok(warp::reply::json(&WebhookResponse { received: true }))
}

async fn dispatch(pool: &PgPool, event_id: &str, event: WebhookEvent) -> Result<(), VectraError> {
	match event {
		WebhookEvent::CheckoutCompleted(session) => {
			let outcome = billing::handle_checkout_completed(pool, &session, Utc::now())
				.await
				.map_err(|e| {
					log::error!(
						target: "vectrahub",
						"Failed to reconcile [event={}] [session={}] with [error={}]",
						event_id,
						session.id,
						e
					);
					e
				})?;
			if let CheckoutOutcome::Activated { user_id, plan_id, .. } = outcome {
				crate::sentry_util::info(format!(
					"Subscription purchased: user {} plan {}",
					user_id, plan_id
				));
			}
		}
		WebhookEvent::PaymentFailed(invoice) => {
			let count = billing::handle_payment_failed(pool, &invoice).await?;
			log::info!(
				target: "vectrahub",
				"Handled payment failure [event={}] [invoice={}], [deactivated={}]",
				event_id,
				invoice.id,
				count
			);
		}
		WebhookEvent::SubscriptionDeleted(subscription) => {
			let count = billing::handle_subscription_deleted(pool, &subscription).await?;
			log::info!(
				target: "vectrahub",
				"Handled cancellation [event={}] [subscription={}], [deactivated={}]",
				event_id,
				subscription.id,
				count
			);
		}
		WebhookEvent::Unhandled(kind) => {
			log::info!(target: "vectrahub", "Ignoring Stripe [event={}] of [type={}]", event_id, kind);
		}
	}

	Ok(())
}

/// `POST /webhook/stripe` endpoint. Reads the raw body, the signature is
/// computed over its exact bytes.
pub fn post_stripe_webhook(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("webhook" / "stripe")
		.and(warp::post())
		.and(warp::body::content_length_limit(WEBHOOK_BODY_LIMIT))
		.and(warp::body::bytes())
		.and(warp::header::optional::<String>(STRIPE_SIGNATURE_HEADER))
		.and_then(move |body, signature| stripe_webhook(body, signature, pool.clone(), config.clone()))
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}
