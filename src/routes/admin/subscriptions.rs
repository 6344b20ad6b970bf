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


//! This file implements the `GET /api/admin/subscriptions` endpoint.

use super::{non_empty, ADMIN_PAGE_SIZE};
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::{
	plan::{list_active_plans, PlanResponse},
	subscription::{list_subscriptions, subscription_stats, SubscriptionDetails, SubscriptionStats},
	Pagination,
};
use crate::session::{with_admin, Session};
use serde::{Deserialize, Serialize};
use warp::Filter;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
	pub page: Option<i64>,
	/// `active` or `expired`.
	pub status: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubscriptionListResponse {
	subscriptions: Vec<SubscriptionDetails>,
	plans: Vec<PlanResponse>,
	stats: SubscriptionStats,
	page: i64,
	total_pages: i64,
}

async fn subscriptions(
	query: SubscriptionQuery,
	_admin: Session,
	pool: PgPool,
) -> Result<impl warp::Reply, warp::Rejection> {
	let pagination = Pagination::new(query.page, None, ADMIN_PAGE_SIZE);
	let status = match non_empty(&query.status) {
		None => None,
		Some(s @ "active") | Some(s @ "expired") => Some(s),
		Some(other) => {
			return Err(VectraError::Validation(format!("Unknown status: {}", other)).into());
		}
	};

	let subscriptions = list_subscriptions(&pool, status, pagination.limit, pagination.offset())
		.await
		.map_err(VectraError::from)?;
	let stats = subscription_stats(&pool).await.map_err(VectraError::from)?;
	let plans = list_active_plans(&pool).await.map_err(VectraError::from)?;
	let total = match status {
		Some("active") => stats.active,
		Some(_) => stats.expired,
		None => stats.total,
	};

	Ok(warp::reply::json(&SubscriptionListResponse {
		subscriptions,
		plans: plans.iter().map(PlanResponse::from).collect(),
		page: pagination.page,
		total_pages: pagination.total_pages(total),
		stats,
	}))
}

/// `GET /api/admin/subscriptions?page&status` endpoint.
pub fn get_subscriptions(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "admin" / "subscriptions")
		.and(warp::get())
		.and(warp::query::<SubscriptionQuery>())
		.and(with_admin(pool.clone(), config))
		.and_then(move |query, admin| subscriptions(query, admin, pool.clone()))
		.with(warp::log("vectrahub"))
}
