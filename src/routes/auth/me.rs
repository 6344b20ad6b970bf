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


//! This file implements the `GET /api/auth/me` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::subscription::get_active_subscription;
use crate::session::{with_session, Session};
use warp::Filter;

async fn me(session: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let subscription = get_active_subscription(&pool, session.user_id())
		.await
		.map_err(VectraError::from)?;

	Ok(warp::reply::json(&serde_json::json!({
		"user": session.user,
		"subscription": subscription,
	})))
}

/// `GET /api/auth/me` endpoint.
pub fn get_me(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "auth" / "me")
		.and(warp::get())
		.and(with_session(pool.clone(), config))
		.and_then(move |session| me(session, pool.clone()))
		.with(warp::log("vectrahub"))
}
