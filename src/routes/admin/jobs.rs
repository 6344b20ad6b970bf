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


//! This file implements the `/api/admin/jobs` endpoints.

use super::{audit, non_empty, parse_date, ADMIN_PAGE_SIZE};
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::{
	image_job::{count_jobs, delete_job, get_job, list_jobs, requeue_failed_job, ImageJob, JobFilter, JobStatus},
	Pagination,
};
use crate::session::{client_ip, with_admin, with_admin_csrf, Session};
use serde::{Deserialize, Serialize};
use warp::Filter;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct JobListQuery {
	pub page: Option<i64>,
	pub status: Option<String>,
	pub date: Option<String>,
	pub user_id: Option<i32>,
}

#[derive(Debug, Serialize)]
struct JobListResponse {
	jobs: Vec<ImageJob>,
	page: i64,
	total: i64,
	total_pages: i64,
}

fn job_filter(query: &JobListQuery) -> Result<JobFilter, VectraError> {
	let status = non_empty(&query.status)
		.map(|s| s.parse::<JobStatus>().map_err(VectraError::Validation))
		.transpose()?;

	Ok(JobFilter {
		status,
		date: parse_date(&query.date)?,
		user_id: query.user_id,
	})
}

async fn job_list(query: JobListQuery, _admin: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let pagination = Pagination::new(query.page, None, ADMIN_PAGE_SIZE);
	let filter = job_filter(&query)?;

	let jobs = list_jobs(&pool, &filter, pagination.limit, pagination.offset())
		.await
		.map_err(VectraError::from)?;
	let total = count_jobs(&pool, &filter).await.map_err(VectraError::from)?;

	Ok(warp::reply::json(&JobListResponse {
		jobs,
		page: pagination.page,
		total,
		total_pages: pagination.total_pages(total),
	}))
}

async fn job_retry(
	job_id: i32,
	admin: Session,
	ip_address: Option<String>,
	pool: PgPool,
) -> Result<impl warp::Reply, warp::Rejection> {
	if !requeue_failed_job(&pool, job_id).await.map_err(VectraError::from)? {
		let exists = get_job(&pool, job_id).await.map_err(VectraError::from)?.is_some();
		return Err(if exists {
			VectraError::Validation("Only failed jobs with a source URL can be retried".into())
		} else {
			VectraError::NotFound("Job not found".into())
		}
		.into());
	}
	audit(&pool, &admin, &format!("Requeued job {}", job_id), ip_address.as_deref()).await?;

	Ok(warp::reply::json(&serde_json::json!({ "success": true })))
}

async fn job_delete(
	job_id: i32,
	admin: Session,
	ip_address: Option<String>,
	pool: PgPool,
) -> Result<impl warp::Reply, warp::Rejection> {
	if !delete_job(&pool, job_id).await.map_err(VectraError::from)? {
		return Err(VectraError::NotFound("Job not found".into()).into());
	}
	audit(&pool, &admin, &format!("Deleted job {}", job_id), ip_address.as_deref()).await?;

	Ok(warp::reply::json(&serde_json::json!({ "success": true })))
}

pub fn routes(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	let list = {
		let pool = pool.clone();
		warp::path!("api" / "admin" / "jobs")
			.and(warp::get())
			.and(warp::query::<JobListQuery>())
			.and(with_admin(pool.clone(), config.clone()))
			.and_then(move |query, admin| job_list(query, admin, pool.clone()))
	};
	let retry = {
		let pool = pool.clone();
		warp::path!("api" / "admin" / "jobs" / i32 / "retry")
			.and(warp::post())
			.and(with_admin_csrf(pool.clone(), config.clone()))
			.and(client_ip())
			.and_then(move |job_id, admin, ip| job_retry(job_id, admin, ip, pool.clone()))
	};
	let delete = warp::path!("api" / "admin" / "jobs" / i32)
		.and(warp::delete())
		.and(with_admin_csrf(pool.clone(), config))
		.and(client_ip())
		.and_then(move |job_id, admin, ip| job_delete(job_id, admin, ip, pool.clone()));

	list.or(retry)
		.or(delete)
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_job_filter() {
		let filter = job_filter(&JobListQuery {
			status: Some("failed".into()),
			date: Some("2024-06-01".into()),
			..Default::default()
		})
		.unwrap();
		assert_eq!(filter.status, Some(JobStatus::Failed));
		assert!(filter.date.is_some());

		let filter = job_filter(&JobListQuery {
			status: Some("".into()),
			..Default::default()
		})
		.unwrap();
		assert_eq!(filter.status, None);

		assert!(job_filter(&JobListQuery {
			status: Some("stuck".into()),
			..Default::default()
		})
		.is_err());
	}
}
