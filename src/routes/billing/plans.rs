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


//! This file implements the `GET /api/plans` endpoint.

use crate::db::{with_db_pool, PgPool};
use crate::errors::VectraError;
use crate::models::plan::{list_active_plans, PlanResponse};
use warp::Filter;

async fn plans(pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let plans = list_active_plans(&pool).await.map_err(|e| {
		log::error!(target: "vectrahub", "Failed to list plans with [error={}]", e);
		VectraError::from(e)
	})?;
	let plans: Vec<PlanResponse> = plans.iter().map(PlanResponse::from).collect();

	Ok(warp::reply::json(&serde_json::json!({ "plans": plans })))
}

/// `GET /api/plans` endpoint.
pub fn get_plans(pool: PgPool) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "plans")
		.and(warp::get())
		.and(with_db_pool(pool))
		.and_then(plans)
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}
