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


//! This file implements the `GET /api/admin/activity` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::activity_log::recent_activity;
use crate::session::{with_admin, Session};
use warp::Filter;

const RECENT_ACTIVITY: i64 = 20;

async fn activity(_admin: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let activity = recent_activity(&pool, RECENT_ACTIVITY)
		.await
		.map_err(VectraError::from)?;

	Ok(warp::reply::json(&serde_json::json!({ "activity": activity })))
}

/// `GET /api/admin/activity` endpoint.
pub fn get_recent_activity(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "admin" / "activity")
		.and(warp::get())
		.and(with_admin(pool.clone(), config))
		.and_then(move |admin| activity(admin, pool.clone()))
		.with(warp::log("vectrahub"))
}
