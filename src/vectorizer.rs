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

//! HTTP client for the vectorization service, which exposes
//! `GET /health`, `POST /vectorize` and `GET /download/<filename>`.

use crate::errors::VectraError;
use crate::models::image_job::VectorizeMode;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);
const VECTORIZE_TIMEOUT: Duration = Duration::from_secs(300);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("VectraHub-Backend/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum VectorizerError {
	#[error("Network error or API unreachable: {0}")]
	Network(String),
	#[error("Vectorization service error: {detail}")]
	Service { status: u16, detail: String },
	#[error("File not found")]
	NotFound,
	#[error("Unexpected response from vectorization service: {0}")]
	InvalidResponse(String),
}

impl From<reqwest::Error> for VectorizerError {
	fn from(e: reqwest::Error) -> Self {
		VectorizerError::Network(e.to_string())
	}
}

impl From<VectorizerError> for VectraError {
	fn from(e: VectorizerError) -> Self {
		match e {
			VectorizerError::NotFound => VectraError::NotFound("File not found".into()),
			other => VectraError::Upstream(other.to_string()),
		}
	}
}

/// Successful `POST /vectorize` response.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct VectorizeOutput {
	pub svg_filename: String,
	#[serde(default)]
	pub download_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct VectorizerClient {
	http: reqwest::Client,
	base_url: String,
}

impl VectorizerClient {
	pub fn new(base_url: &str) -> Result<Self, VectraError> {
		let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

		Ok(VectorizerClient {
			http,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}

	/// The service's own health report.
	pub async fn health(&self) -> Result<Value, VectorizerError> {
		let response = self
			.http
			.get(format!("{}/health", self.base_url))
			.timeout(HEALTH_TIMEOUT)
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await?;
		if !status.is_success() {
			return Err(VectorizerError::Service {
				status: status.as_u16(),
				detail: error_detail(&body),
			});
		}

		serde_json::from_str(&body).map_err(|e| VectorizerError::InvalidResponse(e.to_string()))
	}

	/// Upload image bytes as the multipart field `image`.
	pub async fn vectorize_file(
		&self,
		filename: &str,
		image: Vec<u8>,
		content_type: &str,
		mode: VectorizeMode,
	) -> Result<VectorizeOutput, VectorizerError> {
		let part = reqwest::multipart::Part::bytes(image)
			.file_name(filename.to_string())
			.mime_str(content_type)?;
		let form = reqwest::multipart::Form::new()
			.part("image", part)
			.text("mode", mode.as_str());

		let response = self
			.http
			.post(format!("{}/vectorize", self.base_url))
			.header("Accept", "application/json")
			.multipart(form)
			.timeout(VECTORIZE_TIMEOUT)
			.send()
			.await?;

		read_vectorize_response(response).await
	}

	/// Ask the service to fetch and vectorize a remote image.
	pub async fn vectorize_url(&self, url: &str, mode: VectorizeMode) -> Result<VectorizeOutput, VectorizerError> {
		let response = self
			.http
			.post(format!("{}/vectorize", self.base_url))
			.json(&serde_json::json!({ "image_url": url, "mode": mode.as_str() }))
			.timeout(VECTORIZE_TIMEOUT)
			.send()
			.await?;

		read_vectorize_response(response).await
	}

	/// Fetch a produced SVG.
	pub async fn download(&self, filename: &str) -> Result<Bytes, VectorizerError> {
		let response = self
			.http
			.get(format!("{}/download/{}", self.base_url, filename))
			.timeout(DOWNLOAD_TIMEOUT)
			.send()
			.await?;

		let status = response.status();
		if status == reqwest::StatusCode::NOT_FOUND {
			return Err(VectorizerError::NotFound);
		}
		if !status.is_success() {
			let body = response.text().await?;
			return Err(VectorizerError::Service {
				status: status.as_u16(),
				detail: error_detail(&body),
			});
		}

		Ok(response.bytes().await?)
	}
}

async fn read_vectorize_response(response: reqwest::Response) -> Result<VectorizeOutput, VectorizerError> {
	let status = response.status();
	let body = response.text().await?;

	if !status.is_success() {
		let detail = error_detail(&body);
		log::warn!(
			target: "vectrahub",
			"Vectorization service answered [status={}] with [detail={}]",
			status,
			detail
		);
		return Err(VectorizerError::Service {
			status: status.as_u16(),
			detail,
		});
	}

	parse_vectorize_body(&body)
}

/// A 200 body can still carry `"success": false`.
pub fn parse_vectorize_body(body: &str) -> Result<VectorizeOutput, VectorizerError> {
	let value: Value =
		serde_json::from_str(body).map_err(|e| VectorizerError::InvalidResponse(e.to_string()))?;

	if value.get("success").and_then(Value::as_bool) == Some(false) {
		return Err(VectorizerError::Service {
			status: 200,
			detail: error_detail(body),
		});
	}

	serde_json::from_value(value).map_err(|e| VectorizerError::InvalidResponse(e.to_string()))
}

/// Pull a human readable message out of an error body: `detail`, then
/// `error`, then the raw text.
pub fn error_detail(body: &str) -> String {
	let parsed: Option<Value> = serde_json::from_str(body).ok();
	parsed
		.as_ref()
		.and_then(|v| v.get("detail").or_else(|| v.get("error")))
		.and_then(Value::as_str)
		.map(String::from)
		.unwrap_or_else(|| {
			if body.trim().is_empty() {
				"Unknown API error".to_string()
			} else {
				body.trim().chars().take(200).collect()
			}
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_success_body() {
		let out = parse_vectorize_body(
			r#"{"success": true, "svg_filename": "abc.svg", "download_url": "/download/abc.svg"}"#,
		)
		.unwrap();
		assert_eq!(out.svg_filename, "abc.svg");
		assert_eq!(out.download_url.as_deref(), Some("/download/abc.svg"));
	}

	#[test]
	fn test_parse_failed_body() {
		let err = parse_vectorize_body(r#"{"success": false, "error": "Invalid image file"}"#).unwrap_err();
		assert_eq!(err.to_string(), "Vectorization service error: Invalid image file");
	}

	#[test]
	fn test_error_detail() {
		assert_eq!(error_detail(r#"{"detail": "Too large"}"#), "Too large");
		assert_eq!(error_detail(r#"{"error": "No file selected"}"#), "No file selected");
		assert_eq!(error_detail("Bad Gateway"), "Bad Gateway");
		assert_eq!(error_detail(""), "Unknown API error");
	}

	#[test]
	fn test_network_errors_are_upstream() {
		let err: VectraError = VectorizerError::Network("connection refused".into()).into();
		assert_eq!(err.status_code(), warp::http::StatusCode::BAD_GATEWAY);

		let err: VectraError = VectorizerError::NotFound.into();
		assert_eq!(err.status_code(), warp::http::StatusCode::NOT_FOUND);
	}
}
