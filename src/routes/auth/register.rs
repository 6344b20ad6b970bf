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


//! This file implements the `POST /api/auth/register` endpoint.

use crate::auth::{register_user, Registration};
use crate::db::PgPool;
use crate::routes::json_body;
use crate::session::client_ip;
use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, Filter};

/// Endpoint request body. Missing fields deserialize as empty strings so
/// they are reported as a validation error.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
	#[serde(default)]
	pub full_name: String,
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub password: String,
	#[serde(default)]
	pub confirm_password: String,
	pub referral_code: Option<String>,
}

async fn register(
	body: RegisterRequest,
	ip_address: Option<String>,
	pool: PgPool,
) -> Result<impl warp::Reply, warp::Rejection> {
	let registration = Registration {
		full_name: &body.full_name,
		email: &body.email,
		password: &body.password,
		confirm_password: &body.confirm_password,
	};
	let user = register_user(
		&pool,
		&registration,
		body.referral_code.as_deref(),
		ip_address.as_deref(),
	)
	.await?;

	Ok(warp::reply::with_status(
		warp::reply::json(&serde_json::json!({
			"success": true,
			"message": "Registration successful",
			"user": user,
		})),
		StatusCode::CREATED,
	))
}

/// `POST /api/auth/register` endpoint.
pub fn post_register(
	pool: PgPool,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "auth" / "register")
		.and(warp::post())
		.and(json_body())
		.and(client_ip())
		.and_then(move |body, ip| register(body, ip, pool.clone()))
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}
