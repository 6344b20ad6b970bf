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

use super::cents_to_dollars;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Postgres};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "billing_period", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
	Monthly,
	Yearly,
}

impl BillingPeriod {
	/// Stripe's `recurring.interval` value.
	pub fn stripe_interval(&self) -> &'static str {
		match self {
			BillingPeriod::Monthly => "month",
			BillingPeriod::Yearly => "year",
		}
	}
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Plan {
	pub id: i32,
	pub name: String,
	pub price_cents: i64,
	pub coin_limit: i32,
	pub billing_period: BillingPeriod,
	pub stripe_price_id: Option<String>,
	pub features: String,
	pub active: bool,
}

impl Plan {
	pub fn is_free(&self) -> bool {
		self.price_cents == 0
	}
}

/// JSON shape of a plan, with the price in both cents and dollars.
#[derive(Debug, Serialize)]
pub struct PlanResponse {
	pub id: i32,
	pub name: String,
	pub price: f64,
	pub price_cents: i64,
	pub coin_limit: i32,
	pub billing_period: BillingPeriod,
	pub features: Vec<String>,
}

impl From<&Plan> for PlanResponse {
	fn from(plan: &Plan) -> Self {
		PlanResponse {
			id: plan.id,
			name: plan.name.clone(),
			price: cents_to_dollars(plan.price_cents),
			price_cents: plan.price_cents,
			coin_limit: plan.coin_limit,
			billing_period: plan.billing_period,
			features: plan
				.features
				.split(',')
				.map(str::trim)
				.filter(|f| !f.is_empty())
				.map(String::from)
				.collect(),
		}
	}
}

const PLAN_COLUMNS: &str =
	"id, name, price_cents, coin_limit, billing_period, stripe_price_id, features, active";

pub async fn get_plan<'e, E>(executor: E, id: i32) -> Result<Option<Plan>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, Plan>(&format!(
		"SELECT {} FROM subscription_plans WHERE id = $1",
		PLAN_COLUMNS
	))
	.bind(id)
	.fetch_optional(executor)
	.await
}

pub async fn list_active_plans<'e, E>(executor: E) -> Result<Vec<Plan>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, Plan>(&format!(
		"SELECT {} FROM subscription_plans WHERE active ORDER BY price_cents, id",
		PLAN_COLUMNS
	))
	.fetch_all(executor)
	.await
}

/// The plan given to new users: the one named "Free", or else the first
/// zero-priced plan.
pub async fn get_free_plan<'e, E>(executor: E) -> Result<Option<Plan>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, Plan>(&format!(
		r#"
		SELECT {} FROM subscription_plans
		WHERE name = 'Free' OR price_cents = 0
		ORDER BY (name = 'Free') DESC, id
		LIMIT 1
		"#,
		PLAN_COLUMNS
	))
	.fetch_optional(executor)
	.await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_plan_response_splits_features() {
		let plan = Plan {
			id: 2,
			name: "Basic".into(),
			price_cents: 999,
			coin_limit: 100,
			billing_period: BillingPeriod::Monthly,
			stripe_price_id: None,
			features: "100 vectorizations per month, priority support".into(),
			active: true,
		};
		let response = PlanResponse::from(&plan);
		assert_eq!(response.price, 9.99);
		assert_eq!(
			response.features,
			vec!["100 vectorizations per month", "priority support"]
		);
		assert!(!plan.is_free());
	}
}
