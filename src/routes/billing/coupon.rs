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


//! This file implements the `POST /api/coupons/check` and
//! `POST /api/coupons/apply` endpoints.

use crate::billing::apply_coupon;
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::coupon::{get_valid_coupon, normalize_coupon_code, Coupon, CouponType};
use crate::models::cents_to_dollars;
use crate::routes::json_body;
use crate::session::{with_csrf_session, Session};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use warp::Filter;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CouponRequest {
	#[serde(default)]
	pub coupon_code: String,
}

/// What a coupon would do, without redeeming it.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct CheckCouponResponse {
	pub valid: bool,
	pub message: String,
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub coupon_type: Option<CouponType>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub discount_percent: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub discount_amount: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub free_plan_id: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub free_duration_months: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub plan_name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub plan_coins: Option<i32>,
}

impl CheckCouponResponse {
	fn invalid(message: &str) -> Self {
		CheckCouponResponse {
			message: message.into(),
			..Default::default()
		}
	}

	pub fn from_coupon(coupon: Coupon) -> Self {
		let message = match coupon.coupon_type {
			CouponType::Discount => match (coupon.discount_percent, coupon.discount_amount_cents) {
				(Some(percent), _) => format!("Coupon applied! {}% discount", percent),
				(None, Some(cents)) => format!("Coupon applied! ${:.2} discount", cents_to_dollars(cents)),
				(None, None) => "Coupon applied!".to_string(),
			},
			CouponType::FreePlan | CouponType::FreeUpgrade => format!(
				"Free {} plan for {} month(s)!",
				coupon.plan_name.as_deref().unwrap_or("premium"),
				coupon.free_duration_months.unwrap_or(1)
			),
		};

		CheckCouponResponse {
			valid: true,
			message,
			coupon_type: Some(coupon.coupon_type),
			description: coupon.description,
			discount_percent: coupon.discount_percent,
			discount_amount: coupon.discount_amount_cents.map(cents_to_dollars),
			free_plan_id: coupon.free_plan_id,
			free_duration_months: coupon.free_duration_months,
			plan_name: coupon.plan_name,
			plan_coins: coupon.plan_coins,
		}
	}
}

async fn check(body: CouponRequest, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let code = normalize_coupon_code(&body.coupon_code);
	if code.is_empty() {
		return Ok(warp::reply::json(&CheckCouponResponse::invalid("Please enter a coupon code")));
	}

	let response = match get_valid_coupon(&pool, &code, Utc::now().date_naive())
		.await
		.map_err(VectraError::from)?
	{
		Some(coupon) => CheckCouponResponse::from_coupon(coupon),
		None => CheckCouponResponse::invalid("Invalid or expired coupon code"),
	};

	Ok(warp::reply::json(&response))
}

async fn apply(session: Session, body: CouponRequest, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let redemption = apply_coupon(&pool, session.user_id(), &body.coupon_code, Utc::now()).await?;

	Ok(warp::reply::json(&serde_json::json!({
		"success": true,
		"message": format!(
			"Free {} plan activated for {} month(s)!",
			redemption.plan.name,
			redemption.months
		),
		"type": redemption.coupon_type,
		"subscription": redemption.subscription,
		"coins": redemption.plan.coin_limit,
		"redirect": "dashboard",
	})))
}

/// `POST /api/coupons/check` endpoint.
pub fn post_check_coupon(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "coupons" / "check")
		.and(warp::post())
		.and(with_csrf_session(pool.clone(), config))
		.and(json_body())
		.and_then(move |_session: Session, body| check(body, pool.clone()))
		.with(warp::log("vectrahub"))
}

/// `POST /api/coupons/apply` endpoint.
pub fn post_apply_coupon(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "coupons" / "apply")
		.and(warp::post())
		.and(with_csrf_session(pool.clone(), config))
		.and(json_body())
		.and_then(move |session, body| apply(session, body, pool.clone()))
		.with(warp::log("vectrahub"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use sqlx::types::chrono::NaiveDate;

	fn coupon(coupon_type: CouponType) -> Coupon {
		Coupon {
			id: 1,
			code: "FREEYEAR".into(),
			coupon_type,
			description: Some("A year on us".into()),
			discount_percent: None,
			discount_amount_cents: None,
			free_plan_id: Some(3),
			free_duration_months: Some(12),
			valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
			valid_until: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
			max_uses: None,
			current_uses: 0,
			plan_name: Some("Pro".into()),
			plan_coins: Some(500),
		}
	}

	#[test]
	fn test_free_plan_coupon_description() {
		let response = CheckCouponResponse::from_coupon(coupon(CouponType::FreePlan));
		assert!(response.valid);
		assert_eq!(response.message, "Free Pro plan for 12 month(s)!");

		let json = serde_json::to_value(&response).unwrap();
		assert_eq!(json["type"], "free_plan");
		assert_eq!(json["plan_coins"], 500);
		assert!(json.get("discount_percent").is_none());
	}

	#[test]
	fn test_discount_coupon_description() {
		let response = CheckCouponResponse::from_coupon(Coupon {
			discount_percent: Some(20),
			free_plan_id: None,
			free_duration_months: None,
			plan_name: None,
			plan_coins: None,
			..coupon(CouponType::Discount)
		});
		assert_eq!(response.message, "Coupon applied! 20% discount");
		assert_eq!(response.discount_percent, Some(20));
	}

	#[test]
	fn test_invalid_response_only_carries_the_message() {
		let json = serde_json::to_string(&CheckCouponResponse::invalid("Please enter a coupon code")).unwrap();
		assert_eq!(json, r#"{"valid":false,"message":"Please enter a coupon code"}"#);
	}
}
