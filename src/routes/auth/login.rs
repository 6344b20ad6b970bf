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


//! This file implements the `POST /api/auth/login` endpoint.

use crate::auth::authenticate_user;
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::models::activity_log::{log_system, USER_LOGIN};
use crate::routes::json_body;
use crate::session::{client_ip, create_session, session_cookie};
use serde::{Deserialize, Serialize};
use warp::{http::header::SET_COOKIE, Filter};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoginRequest {
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub password: String,
}

async fn login(
	body: LoginRequest,
	ip_address: Option<String>,
	pool: PgPool,
	config: SharedConfig,
) -> Result<impl warp::Reply, warp::Rejection> {
	let user = match authenticate_user(&pool, &body.email, &body.password).await {
		Ok(user) => user,
		Err(e) => {
			log::info!(
				target: "vectrahub",
				"Failed login for [email={}] from [ip={:?}]",
				body.email.trim(),
				ip_address
			);
			return Err(e.into());
		}
	};

	let token = create_session(&pool, &config, user.id).await?;
	log_system(
		&pool,
		USER_LOGIN,
		&format!("User logged in: {}", user.email),
		Some(user.id),
		ip_address.as_deref(),
	)
	.await
	.map_err(crate::errors::VectraError::from)?;

	Ok(warp::reply::with_header(
		warp::reply::json(&serde_json::json!({
			"success": true,
			"user": user,
		})),
		SET_COOKIE,
		session_cookie(&token, &config),
	))
}

/// `POST /api/auth/login` endpoint.
pub fn post_login(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "auth" / "login")
		.and(warp::post())
		.and(json_body())
		.and(client_ip())
		.and_then(move |body, ip| login(body, ip, pool.clone(), config.clone()))
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}
