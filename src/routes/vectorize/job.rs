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


//! This file implements the `GET /api/jobs/{id}` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::image_job::get_user_job;
use crate::session::{with_session, Session};
use warp::Filter;

async fn job_status(job_id: i32, session: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let job = get_user_job(&pool, session.user_id(), job_id)
		.await
		.map_err(|e| {
			log::error!(
				target: "vectrahub",
				"Failed to get job record for [job_id={}] with [error={}]",
				job_id,
				e
			);
			VectraError::from(e)
		})?
		.ok_or_else(|| VectraError::NotFound("Job not found".into()))?;

	Ok(warp::reply::json(&job))
}

/// `GET /api/jobs/{id}` endpoint. Other users' jobs are reported as missing.
pub fn get_job_status(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "jobs" / i32)
		.and(warp::get())
		.and(with_session(pool.clone(), config))
		.and_then(move |job_id, session| job_status(job_id, session, pool.clone()))
		.with(warp::log("vectrahub"))
}
