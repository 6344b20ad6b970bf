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


//! This file implements `GET` and `PUT /api/admin/settings`.

use super::audit;
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::settings::{get_settings, is_valid_key, upsert_setting};
use crate::routes::json_body;
use crate::session::{client_ip, with_admin, with_admin_csrf, Session};
use std::collections::BTreeMap;
use warp::Filter;

async fn settings(_admin: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let settings = get_settings(&pool).await.map_err(VectraError::from)?;

	Ok(warp::reply::json(&serde_json::json!({ "settings": settings })))
}

async fn update_settings(
	admin: Session,
	body: BTreeMap<String, String>,
	ip_address: Option<String>,
	pool: PgPool,
) -> Result<impl warp::Reply, warp::Rejection> {
	if body.is_empty() {
		return Err(VectraError::Validation("No settings provided".into()).into());
	}
	if let Some(key) = body.keys().find(|k| !is_valid_key(k)) {
		return Err(VectraError::Validation(format!("Invalid setting key: {}", key)).into());
	}

	let mut tx = pool.begin().await.map_err(VectraError::from)?;
	for (key, value) in &body {
		upsert_setting(&mut tx, key, value).await.map_err(VectraError::from)?;
	}
	let keys: Vec<&str> = body.keys().map(String::as_str).collect();
	audit(
		&mut *tx,
		&admin,
		&format!("Updated settings: {}", keys.join(", ")),
		ip_address.as_deref(),
	)
	.await?;
	tx.commit().await.map_err(VectraError::from)?;

	Ok(warp::reply::json(&serde_json::json!({ "success": true })))
}

pub fn routes(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	let get = {
		let pool = pool.clone();
		warp::path!("api" / "admin" / "settings")
			.and(warp::get())
			.and(with_admin(pool.clone(), config.clone()))
			.and_then(move |admin| settings(admin, pool.clone()))
	};
	let put = warp::path!("api" / "admin" / "settings")
		.and(warp::put())
		.and(with_admin_csrf(pool.clone(), config))
		.and(json_body())
		.and(client_ip())
		.and_then(move |admin, body, ip| update_settings(admin, body, ip, pool.clone()));

	get.or(put).with(warp::log("vectrahub"))
}
