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


//! This file implements the `GET /api/bulk/{group_id}` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::image_job::{bulk_group_counts, list_bulk_group, BulkCounts, ImageJob};
use crate::session::{with_session, Session};
use serde::Serialize;
use uuid::Uuid;
use warp::Filter;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ValidStatus {
	Running,
	Completed,
}

/// Complete information about a bulk group
#[derive(Debug, Serialize)]
struct JobStatusResponseBody {
	group_id: Uuid,
	#[serde(flatten)]
	summary: BulkCounts,
	job_status: ValidStatus,
	jobs: Vec<ImageJob>,
}

async fn job_status(group_id: Uuid, session: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let user_id = session.user_id();
	let counts = bulk_group_counts(&pool, user_id, group_id).await.map_err(|e| {
		log::error!(
			target: "vectrahub",
			"Failed to get aggregate info for [group_id={}] with [error={}]",
			group_id,
			e
		);
		VectraError::from(e)
	})?;
	if counts.total == 0 {
		return Err(VectraError::NotFound("Bulk job not found".into()).into());
	}
	let jobs = list_bulk_group(&pool, user_id, group_id)
		.await
		.map_err(VectraError::from)?;

	let job_status = if counts.is_finished() {
		ValidStatus::Completed
	} else {
		ValidStatus::Running
	};

	Ok(warp::reply::json(&JobStatusResponseBody {
		group_id,
		summary: counts,
		job_status,
		jobs,
	}))
}

/// `GET /api/bulk/{group_id}` endpoint.
pub fn get_bulk_job_status(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "bulk" / Uuid)
		.and(warp::get())
		.and(with_session(pool.clone(), config))
		.and_then(move |group_id, session| job_status(group_id, session, pool.clone()))
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}
