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


//! This file implements the `GET /api/download/{filename}` endpoint.

use super::{decode_filename, is_safe_filename};
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::image_job::user_owns_output;
use crate::session::{with_session, Session};
use crate::vectorizer::VectorizerClient;
use warp::http::{header, Response};
use warp::Filter;

async fn download(
	segment: String,
	session: Session,
	pool: PgPool,
	vectorizer: VectorizerClient,
) -> Result<impl warp::Reply, warp::Rejection> {
	let filename = match decode_filename(&segment) {
		Some(name) if is_safe_filename(&name) => name,
		_ => return Err(VectraError::Validation("Invalid filename".into()).into()),
	};
	let owned = user_owns_output(&pool, session.user_id(), &filename)
		.await
		.map_err(VectraError::from)?;
	if !owned {
		return Err(VectraError::NotFound("File not found".into()).into());
	}

	let svg = vectorizer.download(&filename).await.map_err(|e| {
		log::warn!(
			target: "vectrahub",
			"Failed to fetch [svg={}] for [user_id={}] with [error={}]",
			filename,
			session.user_id(),
			e
		);
		VectraError::from(e)
	})?;

	Response::builder()
		.header(header::CONTENT_TYPE, "image/svg+xml")
		.header(
			header::CONTENT_DISPOSITION,
			format!("attachment; filename=\"{}\"", filename.replace('"', "")),
		)
		.body(svg)
		.map_err(|e| VectraError::Internal(e.to_string()).into())
}

/// `GET /api/download/{filename}` endpoint. Only outputs of the caller's own
/// finished jobs are served.
pub fn get_download(
	pool: PgPool,
	config: SharedConfig,
	vectorizer: VectorizerClient,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "download" / String)
		.and(warp::get())
		.and(with_session(pool.clone(), config))
		.and_then(move |filename, session| download(filename, session, pool.clone(), vectorizer.clone()))
		.with(warp::log("vectrahub"))
}
