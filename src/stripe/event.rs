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

//! Typed view of the Stripe webhook events we react to. Only the fields we
//! read are deserialized; Stripe sends many more.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";
pub const CUSTOMER_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

#[derive(Debug, Deserialize)]
struct RawEvent {
	id: String,
	#[serde(rename = "type")]
	kind: String,
	data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
	object: Value,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CheckoutSession {
	pub id: String,
	#[serde(default)]
	pub client_reference_id: Option<String>,
	#[serde(default)]
	pub metadata: HashMap<String, Value>,
	#[serde(default)]
	pub amount_total: Option<i64>,
	#[serde(default)]
	pub subscription: Option<String>,
}

impl CheckoutSession {
	/// Buyer id: `metadata.user_id`, falling back to `client_reference_id`.
	pub fn user_id(&self) -> Option<i32> {
		self.metadata_id("user_id")
			.or_else(|| self.client_reference_id.as_deref().and_then(parse_id))
	}

	pub fn plan_id(&self) -> Option<i32> {
		self.metadata_id("plan_id")
	}

	/// Stripe metadata values are strings, but numbers are accepted too.
	fn metadata_id(&self, key: &str) -> Option<i32> {
		match self.metadata.get(key)? {
			Value::String(s) => parse_id(s),
			Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()).filter(|n| *n > 0),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Invoice {
	pub id: String,
	#[serde(default)]
	pub subscription: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SubscriptionObject {
	pub id: String,
}

#[derive(Debug)]
pub enum WebhookEvent {
	CheckoutCompleted(CheckoutSession),
	PaymentFailed(Invoice),
	SubscriptionDeleted(SubscriptionObject),
	/// Any event type we do not handle, by name.
	Unhandled(String),
}

impl WebhookEvent {
	/// Parse a raw webhook body. The body must be a Stripe event envelope,
	/// and handled event types must carry the object shape we expect.
	pub fn parse(payload: &[u8]) -> Result<(String, Self), serde_json::Error> {
		let raw: RawEvent = serde_json::from_slice(payload)?;
		let event = match raw.kind.as_str() {
			CHECKOUT_SESSION_COMPLETED => {
				WebhookEvent::CheckoutCompleted(serde_json::from_value(raw.data.object)?)
			}
			INVOICE_PAYMENT_FAILED => WebhookEvent::PaymentFailed(serde_json::from_value(raw.data.object)?),
			CUSTOMER_SUBSCRIPTION_DELETED => {
				WebhookEvent::SubscriptionDeleted(serde_json::from_value(raw.data.object)?)
			}
			_ => WebhookEvent::Unhandled(raw.kind),
		};

		Ok((raw.id, event))
	}
}

fn parse_id(s: &str) -> Option<i32> {
	s.trim().parse::<i32>().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_checkout_completed() {
		let payload = br#"{
			"id": "evt_1",
			"type": "checkout.session.completed",
			"data": {"object": {
				"id": "cs_test_123",
				"object": "checkout.session",
				"amount_total": 500,
				"client_reference_id": "7",
				"metadata": {"user_id": "42", "plan_id": "9"},
				"subscription": "sub_123"
			}}
		}"#;

		let (id, event) = WebhookEvent::parse(payload).unwrap();
		assert_eq!(id, "evt_1");
		match event {
			WebhookEvent::CheckoutCompleted(session) => {
				assert_eq!(session.id, "cs_test_123");
				assert_eq!(session.user_id(), Some(42));
				assert_eq!(session.plan_id(), Some(9));
				assert_eq!(session.amount_total, Some(500));
				assert_eq!(session.subscription.as_deref(), Some("sub_123"));
			}
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_user_id_falls_back_to_client_reference() {
		let session: CheckoutSession = serde_json::from_str(
			r#"{"id": "cs_1", "client_reference_id": "7", "metadata": {"plan_id": 3}}"#,
		)
		.unwrap();
		assert_eq!(session.user_id(), Some(7));
		assert_eq!(session.plan_id(), Some(3));
	}

	#[test]
	fn test_missing_or_invalid_ids() {
		let session: CheckoutSession =
			serde_json::from_str(r#"{"id": "cs_1", "metadata": {"user_id": "abc", "plan_id": "-1"}}"#)
				.unwrap();
		assert_eq!(session.user_id(), None);
		assert_eq!(session.plan_id(), None);
	}

	#[test]
	fn test_unhandled_event() {
		let payload = br#"{"id": "evt_2", "type": "customer.created", "data": {"object": {}}}"#;
		let (_, event) = WebhookEvent::parse(payload).unwrap();
		assert!(matches!(event, WebhookEvent::Unhandled(kind) if kind == "customer.created"));
	}

	#[test]
	fn test_not_an_event() {
		assert!(WebhookEvent::parse(b"not json").is_err());
		assert!(WebhookEvent::parse(br#"{"type": "invoice.payment_failed"}"#).is_err());
	}
}
