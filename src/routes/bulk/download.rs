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


//! This file implements the `GET /api/bulk/{group_id}/download` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::image_job::{list_bulk_group, ImageJob, JobStatus};
use crate::session::{with_session, Session};
use serde::Serialize;
use uuid::Uuid;
use warp::http::{header, Response};
use warp::Filter;

/// One CSV line per job.
#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
	position: Option<i32>,
	filename: &'a str,
	input_url: Option<&'a str>,
	status: JobStatus,
	output_svg_path: Option<&'a str>,
	error: Option<&'a str>,
}

impl<'a> From<&'a ImageJob> for CsvRecord<'a> {
	fn from(job: &'a ImageJob) -> Self {
		CsvRecord {
			position: job.bulk_position,
			filename: &job.original_filename,
			input_url: job.input_url.as_deref(),
			status: job.status,
			output_svg_path: job.output_svg_path.as_deref(),
			error: job.error.as_deref(),
		}
	}
}

/// Render the jobs of a bulk group as CSV, with a header row.
pub fn jobs_to_csv(jobs: &[ImageJob]) -> Result<Vec<u8>, VectraError> {
	let mut wtr = csv::Writer::from_writer(vec![]);
	for job in jobs {
		wtr.serialize(CsvRecord::from(job))
			.map_err(|e| VectraError::Internal(e.to_string()))?;
	}

	wtr.into_inner().map_err(|e| VectraError::Internal(e.to_string()))
}

async fn job_result(group_id: Uuid, session: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let jobs = list_bulk_group(&pool, session.user_id(), group_id)
		.await
		.map_err(|e| {
			log::error!(
				target: "vectrahub",
				"Failed to get results for [group_id={}] with [error={}]",
				group_id,
				e
			);
			VectraError::from(e)
		})?;
	if jobs.is_empty() {
		return Err(VectraError::NotFound("Bulk job not found".into()).into());
	}

	let body = jobs_to_csv(&jobs)?;
	Response::builder()
		.header(header::CONTENT_TYPE, "text/csv")
		.header(
			header::CONTENT_DISPOSITION,
			format!("attachment; filename=\"bulk-{}.csv\"", group_id),
		)
		.body(body)
		.map_err(|e| VectraError::Internal(e.to_string()).into())
}

/// `GET /api/bulk/{group_id}/download` endpoint.
pub fn get_bulk_job_result(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "bulk" / Uuid / "download")
		.and(warp::get())
		.and(with_session(pool.clone(), config))
		.and_then(move |group_id, session| job_result(group_id, session, pool.clone()))
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::image_job::VectorizeMode;
	use sqlx::types::chrono::Utc;

	#[test]
	fn test_jobs_to_csv() {
		let job = ImageJob {
			id: 1,
			user_id: 2,
			original_filename: "a.png".into(),
			input_url: Some("https://example.com/a.png".into()),
			output_svg_path: Some("a.svg".into()),
			status: JobStatus::Done,
			mode: VectorizeMode::Color,
			coins_used: 1,
			error: None,
			is_bulk: true,
			bulk_group_id: None,
			bulk_position: Some(1),
			created_at: Utc::now(),
			updated_at: Utc::now(),
		};

		let csv = String::from_utf8(jobs_to_csv(&[job]).unwrap()).unwrap();
		assert_eq!(
			csv,
			"position,filename,input_url,status,output_svg_path,error\n\
			 1,a.png,https://example.com/a.png,done,a.svg,\n"
		);
	}
}
