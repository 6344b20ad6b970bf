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


//! This file implements the `GET /api/auth/csrf-token` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::session::{ensure_csrf_token, with_session, Session};
use serde::Serialize;
use warp::Filter;

#[derive(Debug, Serialize)]
struct CsrfResponse {
	csrf_token: String,
}

async fn csrf_token(
	session: Session,
	pool: PgPool,
	config: SharedConfig,
) -> Result<impl warp::Reply, warp::Rejection> {
	let csrf_token = ensure_csrf_token(&pool, &config, &session).await?;

	Ok(warp::reply::json(&CsrfResponse { csrf_token }))
}

/// `GET /api/auth/csrf-token` endpoint.
pub fn get_csrf_token(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "auth" / "csrf-token")
		.and(warp::get())
		.and(with_session(pool.clone(), config.clone()))
		.and_then(move |session| csrf_token(session, pool.clone(), config.clone()))
		.with(warp::log("vectrahub"))
}
