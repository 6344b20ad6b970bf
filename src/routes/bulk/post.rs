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


//! This file implements the `POST /api/bulk` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::ledger::VECTORIZE_COST;
use crate::models::image_job::{create_bulk_jobs, VectorizeMode};
use crate::routes::json_body_with_limit;
use crate::session::{with_csrf_session, Session};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warp::{http::StatusCode, Filter};

/// Largest number of images in one bulk request.
pub const MAX_BULK_URLS: usize = 50;
/// Room for `MAX_BULK_URLS` signed CDN links of a few kilobytes each.
const BULK_BODY_LIMIT: u64 = 1024 * 256;

/// Endpoint request body.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreateBulkRequestBody {
	pub urls: Vec<String>,
	#[serde(default)]
	pub mode: VectorizeMode,
}

/// Endpoint response body.
#[derive(Clone, Debug, Deserialize, Serialize)]
struct CreateBulkResponseBody {
	success: bool,
	group_id: Uuid,
	total: usize,
}

/// Trim the URLs, drop blank lines and refuse anything that is not http(s).
pub fn validate_urls(urls: &[String]) -> Result<Vec<String>, VectraError> {
	let urls: Vec<String> = urls
		.iter()
		.map(|u| u.trim())
		.filter(|u| !u.is_empty())
		.map(String::from)
		.collect();

	if urls.is_empty() {
		return Err(VectraError::Validation("No image URLs provided".into()));
	}
	if urls.len() > MAX_BULK_URLS {
		return Err(VectraError::Validation(format!(
			"A bulk request accepts at most {} images",
			MAX_BULK_URLS
		)));
	}
	if let Some(bad) = urls
		.iter()
		.find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
	{
		return Err(VectraError::Validation(format!("Invalid image URL: {}", bad)));
	}

	Ok(urls)
}

async fn create_bulk(
	session: Session,
	body: CreateBulkRequestBody,
	pool: PgPool,
) -> Result<impl warp::Reply, warp::Rejection> {
	let user_id = session.user_id();
	let urls = validate_urls(&body.urls)?;

	let cost = urls.len() as i64 * VECTORIZE_COST as i64;
	if (session.user.coins as i64) < cost {
		return Err(VectraError::InsufficientCoins.into());
	}

	let group_id = Uuid::new_v4();
	let mut tx = pool.begin().await.map_err(VectraError::from)?;
	create_bulk_jobs(&mut tx, user_id, group_id, &urls, body.mode)
		.await
		.map_err(|e| {
			log::error!(
				target: "vectrahub",
				"Failed to queue bulk [group_id={}] for [user_id={}] with [error={}]",
				group_id,
				user_id,
				e
			);
			VectraError::from(e)
		})?;
	tx.commit().await.map_err(VectraError::from)?;

	log::info!(
		target: "vectrahub",
		"Queued bulk [group_id={}] of [total={}] for [user_id={}]",
		group_id,
		urls.len(),
		user_id
	);

	Ok(warp::reply::with_status(
		warp::reply::json(&CreateBulkResponseBody {
			success: true,
			group_id,
			total: urls.len(),
		}),
		StatusCode::CREATED,
	))
}

/// `POST /api/bulk` endpoint.
pub fn create_bulk_job(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "bulk")
		.and(warp::post())
		.and(with_csrf_session(pool.clone(), config))
		.and(json_body_with_limit(BULK_BODY_LIMIT))
		.and_then(move |session, body| create_bulk(session, body, pool.clone()))
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_validate_urls() {
		let urls = validate_urls(&[
			" https://example.com/a.png ".into(),
			"".into(),
			"http://example.com/b.jpg".into(),
		])
		.unwrap();
		assert_eq!(urls, vec!["https://example.com/a.png", "http://example.com/b.jpg"]);

		assert!(validate_urls(&[]).is_err());
		assert!(validate_urls(&["ftp://example.com/a.png".into()]).is_err());

		let too_many: Vec<String> = (0..=MAX_BULK_URLS)
			.map(|i| format!("https://example.com/{}.png", i))
			.collect();
		assert!(validate_urls(&too_many).is_err());
	}

	#[tokio::test]
	async fn test_body_limit_fits_a_full_batch_of_long_urls() {
		let body = CreateBulkRequestBody {
			urls: (0..MAX_BULK_URLS)
				.map(|i| format!("https://cdn.example.com/{}/{}.png?sig={}", i, "a".repeat(1500), "b".repeat(500)))
				.collect(),
			mode: VectorizeMode::Bw,
		};

		let parsed: CreateBulkRequestBody = warp::test::request()
			.method("POST")
			.json(&body)
			.filter(&json_body_with_limit(BULK_BODY_LIMIT))
			.await
			.unwrap();
		assert_eq!(parsed.urls.len(), MAX_BULK_URLS);
		assert!(validate_urls(&parsed.urls).is_ok());

		let refused = warp::test::request()
			.method("POST")
			.json(&body)
			.filter(&crate::routes::json_body::<CreateBulkRequestBody>())
			.await;
		assert!(refused.is_err());
	}
}
