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


//! This file implements the `GET /api/admin/logs` endpoint.

use super::{non_empty, parse_date};
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::{
	activity_log::{count_system_logs, list_system_logs, SystemLog, SystemLogFilter},
	Pagination,
};
use crate::session::{with_admin, Session};
use serde::{Deserialize, Serialize};
use warp::Filter;

const LOGS_PAGE_SIZE: i64 = 50;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LogQuery {
	pub page: Option<i64>,
	#[serde(rename = "type")]
	pub kind: Option<String>,
	pub date: Option<String>,
	pub search: Option<String>,
}

#[derive(Debug, Serialize)]
struct LogListResponse {
	logs: Vec<SystemLog>,
	page: i64,
	total: i64,
	total_pages: i64,
}

async fn system_logs(query: LogQuery, _admin: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let pagination = Pagination::new(query.page, None, LOGS_PAGE_SIZE);
	let filter = SystemLogFilter {
		kind: non_empty(&query.kind),
		date: parse_date(&query.date)?,
		search: non_empty(&query.search),
	};

	let logs = list_system_logs(&pool, &filter, pagination.limit, pagination.offset())
		.await
		.map_err(VectraError::from)?;
	let total = count_system_logs(&pool, &filter).await.map_err(VectraError::from)?;

	Ok(warp::reply::json(&LogListResponse {
		logs,
		page: pagination.page,
		total,
		total_pages: pagination.total_pages(total),
	}))
}

/// `GET /api/admin/logs?page&type&date&search` endpoint.
pub fn get_system_logs(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "admin" / "logs")
		.and(warp::get())
		.and(warp::query::<LogQuery>())
		.and(with_admin(pool.clone(), config))
		.and_then(move |query, admin| system_logs(query, admin, pool.clone()))
		.with(warp::log("vectrahub"))
}
