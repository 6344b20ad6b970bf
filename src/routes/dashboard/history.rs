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


//! This file implements the `GET /api/history` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::{
	image_job::{list_user_jobs, user_job_stats, ImageJob},
	Pagination,
};
use crate::session::{with_session, Session};
use serde::{Deserialize, Serialize};
use warp::Filter;

const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HistoryQuery {
	pub page: Option<i64>,
	pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
	jobs: Vec<ImageJob>,
	page: i64,
	limit: i64,
	total: i64,
	total_pages: i64,
}

async fn history(
	query: HistoryQuery,
	session: Session,
	pool: PgPool,
) -> Result<impl warp::Reply, warp::Rejection> {
	let user_id = session.user_id();
	let pagination = Pagination::new(query.page, query.limit, DEFAULT_PAGE_SIZE);

	let jobs = list_user_jobs(&pool, user_id, pagination.limit, pagination.offset())
		.await
		.map_err(VectraError::from)?;
	let total = user_job_stats(&pool, user_id)
		.await
		.map_err(VectraError::from)?
		.total_jobs;

	Ok(warp::reply::json(&HistoryResponse {
		jobs,
		page: pagination.page,
		limit: pagination.limit,
		total,
		total_pages: pagination.total_pages(total),
	}))
}

/// `GET /api/history?page&limit` endpoint, newest jobs first.
pub fn get_history(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "history")
		.and(warp::get())
		.and(warp::query::<HistoryQuery>())
		.and(with_session(pool.clone(), config))
		.and_then(move |query, session| history(query, session, pool.clone()))
		.with(warp::log("vectrahub"))
}
