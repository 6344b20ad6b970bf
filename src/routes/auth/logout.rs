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


//! This file implements the `POST /api/auth/logout` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::session::{destroy_session, expired_session_cookie, with_csrf_session, Session};
use warp::{http::header::SET_COOKIE, Filter};

async fn logout(
	session: Session,
	pool: PgPool,
	config: SharedConfig,
) -> Result<impl warp::Reply, warp::Rejection> {
	destroy_session(&pool, session.id).await?;
	log::debug!(target: "vectrahub", "Logged out [user_id={}]", session.user_id());

	Ok(warp::reply::with_header(
		warp::reply::json(&serde_json::json!({ "success": true })),
		SET_COOKIE,
		expired_session_cookie(&config),
	))
}

/// `POST /api/auth/logout` endpoint.
pub fn post_logout(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "auth" / "logout")
		.and(warp::post())
		.and(with_csrf_session(pool.clone(), config.clone()))
		.and_then(move |session| logout(session, pool.clone(), config.clone()))
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}
