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


//! This file implements the `GET /api/admin/stats` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::{
	cents_to_dollars,
	image_job::{count_jobs, JobFilter},
	payment::revenue_this_month,
	subscription::subscription_stats,
	user::count_users,
};
use crate::session::{with_admin, Session};
use serde::Serialize;
use warp::Filter;

#[derive(Debug, Serialize)]
struct AdminStats {
	total_users: i64,
	total_jobs: i64,
	active_subscriptions: i64,
	revenue_this_month: f64,
	revenue_this_month_cents: i64,
}

async fn admin_stats(_admin: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let total_users = count_users(&pool, None, None).await.map_err(VectraError::from)?;
	let total_jobs = count_jobs(&pool, &JobFilter::default())
		.await
		.map_err(VectraError::from)?;
	let subscriptions = subscription_stats(&pool).await.map_err(VectraError::from)?;
	let revenue = revenue_this_month(&pool).await.map_err(VectraError::from)?;

	Ok(warp::reply::json(&AdminStats {
		total_users,
		total_jobs,
		active_subscriptions: subscriptions.active,
		revenue_this_month: cents_to_dollars(revenue),
		revenue_this_month_cents: revenue,
	}))
}

/// `GET /api/admin/stats` endpoint.
pub fn get_admin_stats(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "admin" / "stats")
		.and(warp::get())
		.and(with_admin(pool.clone(), config))
		.and_then(move |admin| admin_stats(admin, pool.clone()))
		.with(warp::log("vectrahub"))
}
