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


//! This file implements the `GET /api/health` endpoint.

use crate::db::PgPool;
use crate::vectorizer::VectorizerClient;
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use warp::{http::StatusCode, Filter};

#[derive(Debug, Serialize)]
struct HealthResponse {
	status: &'static str,
	database: &'static str,
	vectorizer: Value,
}

async fn health(pool: PgPool, vectorizer: VectorizerClient) -> Result<impl warp::Reply, Infallible> {
	let database_ok = match sqlx::query("SELECT 1").execute(&pool).await {
		Ok(_) => true,
		Err(e) => {
			log::error!(target: "vectrahub", "Health check: database unreachable with [error={}]", e);
			false
		}
	};
	let (vectorizer_ok, vectorizer_status) = match vectorizer.health().await {
		Ok(report) => (true, report),
		Err(e) => {
			log::warn!(target: "vectrahub", "Health check: vectorizer unhealthy with [error={}]", e);
			(false, serde_json::json!({ "error": e.to_string() }))
		}
	};

	let healthy = database_ok && vectorizer_ok;
	let code = if healthy {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	};

	Ok(warp::reply::with_status(
		warp::reply::json(&HealthResponse {
			status: if healthy { "healthy" } else { "unhealthy" },
			database: if database_ok { "connected" } else { "disconnected" },
			vectorizer: vectorizer_status,
		}),
		code,
	))
}

/// `GET /api/health` endpoint.
pub fn get_health(
	pool: PgPool,
	vectorizer: VectorizerClient,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "health")
		.and(warp::get())
		.and_then(move || health(pool.clone(), vectorizer.clone()))
		.with(warp::log("vectrahub"))
}
