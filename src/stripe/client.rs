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

use crate::config::Config;
use crate::errors::VectraError;
use crate::models::plan::Plan;
use serde::Deserialize;
use std::time::Duration;

const STRIPE_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin client over the Stripe REST API.
#[derive(Clone, Debug)]
pub struct StripeClient {
	http: reqwest::Client,
	api_base: String,
	secret_key: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionCreated {
	pub id: String,
	pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
	error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
	message: Option<String>,
}

impl StripeClient {
	pub fn new(config: &Config) -> Result<Self, VectraError> {
		let http = reqwest::Client::builder().timeout(STRIPE_TIMEOUT).build()?;

		Ok(StripeClient {
			http,
			api_base: config.stripe_api_base.clone(),
			secret_key: config.stripe_secret_key.clone(),
		})
	}

	/// Create a Checkout Session for `plan`, bought by `user_id`.
	pub async fn create_checkout_session(
		&self,
		plan: &Plan,
		user_id: i32,
		app_url: &str,
	) -> Result<CheckoutSessionCreated, VectraError> {
		if self.secret_key.is_empty() {
			return Err(VectraError::Internal("Stripe secret key not configured".into()));
		}

		let response = self
			.http
			.post(format!("{}/v1/checkout/sessions", self.api_base))
			.bearer_auth(&self.secret_key)
			.form(&checkout_form(plan, user_id, app_url))
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			let message = response
				.json::<StripeErrorBody>()
				.await
				.ok()
				.and_then(|body| body.error.message)
				.unwrap_or_else(|| status.to_string());
			log::error!(
				target: "vectrahub",
				"Stripe refused checkout session for [plan_id={}] [user_id={}] with [status={}] [error={}]",
				plan.id,
				user_id,
				status,
				message
			);
			return Err(VectraError::Upstream(format!("Stripe API error: {}", message)));
		}

		Ok(response.json::<CheckoutSessionCreated>().await?)
	}
}

/// Form fields of the Checkout Session request. Plans with a Stripe price
/// become subscriptions, the others a one-time payment with inline price
/// data.
pub fn checkout_form(plan: &Plan, user_id: i32, app_url: &str) -> Vec<(String, String)> {
	let user_id = user_id.to_string();
	let plan_id = plan.id.to_string();
	let mut form: Vec<(String, String)> = vec![
		(
			"success_url".into(),
			format!("{}/billing?session_id={{CHECKOUT_SESSION_ID}}", app_url),
		),
		("cancel_url".into(), format!("{}/billing?canceled=true", app_url)),
		("client_reference_id".into(), user_id.clone()),
		("metadata[user_id]".into(), user_id.clone()),
		("metadata[plan_id]".into(), plan_id.clone()),
		("line_items[0][quantity]".into(), "1".into()),
	];

	match plan.stripe_price_id.as_deref().filter(|id| !id.is_empty()) {
		Some(price_id) => {
			form.push(("mode".into(), "subscription".into()));
			form.push(("line_items[0][price]".into(), price_id.into()));
			form.push(("subscription_data[metadata][user_id]".into(), user_id));
			form.push(("subscription_data[metadata][plan_id]".into(), plan_id));
		}
		None => {
			form.push(("mode".into(), "payment".into()));
			form.push(("line_items[0][price_data][currency]".into(), "usd".into()));
			form.push((
				"line_items[0][price_data][product_data][name]".into(),
				plan.name.clone(),
			));
			if !plan.features.is_empty() {
				form.push((
					"line_items[0][price_data][product_data][description]".into(),
					plan.features.clone(),
				));
			}
			form.push((
				"line_items[0][price_data][unit_amount]".into(),
				plan.price_cents.to_string(),
			));
		}
	}

	form
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::plan::BillingPeriod;

	fn plan(stripe_price_id: Option<&str>) -> Plan {
		Plan {
			id: 9,
			name: "Starter".into(),
			price_cents: 500,
			coin_limit: 1000,
			billing_period: BillingPeriod::Monthly,
			stripe_price_id: stripe_price_id.map(String::from),
			features: String::new(),
			active: true,
		}
	}

	fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
		form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	#[test]
	fn test_one_time_payment_form() {
		let form = checkout_form(&plan(None), 42, "https://vectrahub.online");
		assert_eq!(field(&form, "mode"), Some("payment"));
		assert_eq!(field(&form, "line_items[0][price_data][unit_amount]"), Some("500"));
		assert_eq!(field(&form, "metadata[user_id]"), Some("42"));
		assert_eq!(field(&form, "metadata[plan_id]"), Some("9"));
		assert_eq!(field(&form, "client_reference_id"), Some("42"));
		assert_eq!(
			field(&form, "success_url"),
			Some("https://vectrahub.online/billing?session_id={CHECKOUT_SESSION_ID}")
		);
		assert_eq!(field(&form, "line_items[0][price]"), None);
	}

	#[test]
	fn test_subscription_form() {
		let form = checkout_form(&plan(Some("price_123")), 42, "https://vectrahub.online");
		assert_eq!(field(&form, "mode"), Some("subscription"));
		assert_eq!(field(&form, "line_items[0][price]"), Some("price_123"));
		assert_eq!(field(&form, "subscription_data[metadata][plan_id]"), Some("9"));
		assert_eq!(field(&form, "line_items[0][price_data][currency]"), None);
	}
}
