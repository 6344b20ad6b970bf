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


//! Single image vectorization, proxied to the vectorization service.

pub mod download;
pub mod health;
pub mod job;
pub mod post;

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::vectorizer::VectorizerClient;
use warp::Filter;

/// Image types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/jpg"];

/// A bare file name: no directory part and no parent reference.
pub fn is_safe_filename(name: &str) -> bool {
	!name.is_empty()
		&& name.len() <= 255
		&& !name.contains(|c| c == '/' || c == '\\' || c == '\0')
		&& !name.contains("..")
}

/// Path under which an output file is served, with the name percent-encoded
/// as a single segment.
pub fn download_path(filename: &str) -> String {
	format!("/api/download/{}", urlencoding::encode(filename))
}

/// Decode the `{filename}` segment of a download path.
pub fn decode_filename(segment: &str) -> Option<String> {
	urlencoding::decode(segment).ok().map(|name| name.into_owned())
}

pub fn routes(
	pool: PgPool,
	config: SharedConfig,
	vectorizer: VectorizerClient,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	post::post_vectorize(pool.clone(), config.clone(), vectorizer.clone())
		.or(job::get_job_status(pool.clone(), config.clone()))
		.or(download::get_download(pool.clone(), config, vectorizer.clone()))
		.or(health::get_health(pool, vectorizer))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_safe_filename() {
		assert!(is_safe_filename("d41d8cd9.svg"));
		assert!(is_safe_filename("logo final.svg"));
		assert!(!is_safe_filename(""));
		assert!(!is_safe_filename("../etc/passwd"));
		assert!(!is_safe_filename("outputs/a.svg"));
		assert!(!is_safe_filename("..\\a.svg"));
	}

	#[test]
	fn test_download_path_round_trips_unusual_names() {
		let path = download_path("logo final#2?.svg");
		assert_eq!(path, "/api/download/logo%20final%232%3F.svg");

		let segment = path.trim_start_matches("/api/download/");
		assert_eq!(decode_filename(segment).as_deref(), Some("logo final#2?.svg"));
	}

	#[test]
	fn test_decoded_traversal_is_still_refused() {
		let name = decode_filename("..%2Fetc%2Fpasswd").unwrap();
		assert!(!is_safe_filename(&name));
		assert_eq!(decode_filename("%FF"), None);
	}
}
