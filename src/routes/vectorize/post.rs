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


//! This file implements the `POST /api/vectorize` endpoint.
//!
//! The upload is forwarded to the vectorization service while the request
//! waits. The coin is only taken once the service produced an SVG.

use super::{download_path, is_safe_filename, ALLOWED_CONTENT_TYPES};
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::ledger::VECTORIZE_COST;
use crate::models::image_job::{create_upload_job, mark_job_failed, VectorizeMode};
use crate::session::{with_csrf_session, Session};
use crate::vectorizer::VectorizerClient;
use crate::worker::complete_job;
use bytes::BufMut;
use futures::TryStreamExt;
use serde::Serialize;
use warp::multipart::{FormData, Part};
use warp::Filter;

/// The uploaded image, as read from the multipart form.
#[derive(Debug)]
struct Upload {
	filename: String,
	content_type: String,
	data: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct VectorizeResponse {
	success: bool,
	job_id: i32,
	svg_filename: String,
	download_url: String,
	coins_used: i32,
}

fn invalid_upload(e: warp::Error) -> VectraError {
	VectraError::Validation(format!("Invalid upload: {}", e))
}

async fn read_part(part: Part) -> Result<Vec<u8>, VectraError> {
	part.stream()
		.try_fold(Vec::new(), |mut data, chunk| async move {
			data.put(chunk);
			Ok::<_, warp::Error>(data)
		})
		.await
		.map_err(invalid_upload)
}

/// Pull the `image` file and the optional `mode` field out of the form.
async fn read_form(form: FormData) -> Result<(Option<Upload>, VectorizeMode), VectraError> {
	let parts: Vec<Part> = form.try_collect().await.map_err(invalid_upload)?;

	let mut upload = None;
	let mut mode = VectorizeMode::default();
	for part in parts {
		match part.name() {
			"image" => {
				let filename = part.filename().unwrap_or("image").to_string();
				let content_type = part.content_type().unwrap_or_default().to_lowercase();
				let data = read_part(part).await?;
				upload = Some(Upload {
					filename,
					content_type,
					data,
				});
			}
			"mode" => {
				let value = read_part(part).await?;
				let value = String::from_utf8_lossy(&value);
				if !value.trim().is_empty() {
					mode = value.trim().parse().map_err(VectraError::Validation)?;
				}
			}
			_ => {}
		}
	}

	Ok((upload, mode))
}

/// Keep the last path segment of a client-supplied file name.
fn clean_filename(name: &str) -> String {
	let name = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default().trim();
	if is_safe_filename(name) {
		name.to_string()
	} else {
		"image".to_string()
	}
}

async fn vectorize(
	session: Session,
	form: FormData,
	pool: PgPool,
	vectorizer: VectorizerClient,
) -> Result<impl warp::Reply, warp::Rejection> {
	let user_id = session.user_id();
	let (upload, mode) = read_form(form).await?;
	let upload = upload
		.filter(|u| !u.data.is_empty())
		.ok_or_else(|| VectraError::Validation("No file selected".into()))?;
	if !ALLOWED_CONTENT_TYPES.contains(&upload.content_type.as_str()) {
		return Err(VectraError::Validation(
			"Invalid file type. Only PNG and JPEG images are allowed".into(),
		)
		.into());
	}
	if session.user.coins < VECTORIZE_COST {
		return Err(VectraError::InsufficientCoins.into());
	}

	let filename = clean_filename(&upload.filename);
	let job = create_upload_job(&pool, user_id, &filename, mode)
		.await
		.map_err(VectraError::from)?;

	let output = match vectorizer
		.vectorize_file(&filename, upload.data, &upload.content_type, mode)
		.await
	{
		Ok(output) => output,
		Err(e) => {
			log::warn!(
				target: "vectrahub",
				"Vectorization failed for [job_id={}] [user_id={}] with [error={}]",
				job.id,
				user_id,
				e
			);
			mark_job_failed(&pool, job.id, &e.to_string())
				.await
				.map_err(VectraError::from)?;
			return Err(VectraError::from(e).into());
		}
	};

	complete_job(&pool, &job, &output.svg_filename).await?;

	Ok(warp::reply::json(&VectorizeResponse {
		success: true,
		job_id: job.id,
		download_url: download_path(&output.svg_filename),
		svg_filename: output.svg_filename,
		coins_used: VECTORIZE_COST,
	}))
}

/// `POST /api/vectorize` endpoint, a multipart form with an `image` file and
/// an optional `mode` (`color` or `bw`).
pub fn post_vectorize(
	pool: PgPool,
	config: SharedConfig,
	vectorizer: VectorizerClient,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	let max_length = config.upload_max_size;

	warp::path!("api" / "vectorize")
		.and(warp::post())
		.and(with_csrf_session(pool.clone(), config))
		.and(warp::multipart::form().max_length(max_length))
		.and_then(move |session, form| vectorize(session, form, pool.clone(), vectorizer.clone()))
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_clean_filename() {
		assert_eq!(clean_filename("photo.png"), "photo.png");
		assert_eq!(clean_filename("C:\\Users\\ada\\photo.png"), "photo.png");
		assert_eq!(clean_filename("/tmp/photo.png"), "photo.png");
		assert_eq!(clean_filename(".."), "image");
		assert_eq!(clean_filename(""), "image");
	}
}
