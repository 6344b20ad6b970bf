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


//! Bulk vectorization: a batch of image URLs queued for the background
//! workers, then polled and exported as CSV.

pub mod download;
pub mod get;
pub mod post;

use crate::config::SharedConfig;
use crate::db::PgPool;
use warp::Filter;

pub fn routes(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	post::create_bulk_job(pool.clone(), config.clone())
		.or(get::get_bulk_job_status(pool.clone(), config.clone()))
		.or(download::get_bulk_job_result(pool, config))
}
