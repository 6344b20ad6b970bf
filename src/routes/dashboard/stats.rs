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


//! This file implements the `GET /api/dashboard/stats` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::{image_job::user_job_stats, subscription::get_active_subscription};
use crate::session::{with_session, Session};
use serde::Serialize;
use sqlx::types::chrono::{DateTime, Utc};
use warp::Filter;

#[derive(Debug, Serialize)]
struct DashboardStats {
	total_jobs: i64,
	successful_jobs: i64,
	failed_jobs: i64,
	coins_spent: i64,
	coins: i32,
	active_plan: Option<String>,
	plan_end_date: Option<DateTime<Utc>>,
}

async fn dashboard_stats(session: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let user_id = session.user_id();
	let jobs = user_job_stats(&pool, user_id).await.map_err(VectraError::from)?;
	let subscription = get_active_subscription(&pool, user_id)
		.await
		.map_err(VectraError::from)?;

	Ok(warp::reply::json(&DashboardStats {
		total_jobs: jobs.total_jobs,
		successful_jobs: jobs.successful_jobs,
		failed_jobs: jobs.failed_jobs,
		coins_spent: jobs.coins_spent,
		coins: session.user.coins,
		plan_end_date: subscription.as_ref().map(|s| s.end_date),
		active_plan: subscription.map(|s| s.plan_name),
	}))
}

/// `GET /api/dashboard/stats` endpoint.
pub fn get_dashboard_stats(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "dashboard" / "stats")
		.and(warp::get())
		.and(with_session(pool.clone(), config))
		.and_then(move |session| dashboard_stats(session, pool.clone()))
		.with(warp::log("vectrahub"))
}
