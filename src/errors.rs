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

//! Describe a common response error to be used by all routes, should an error
//! happen.

use crate::sentry_util;
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::convert::Infallible;
use warp::{http::StatusCode, reject, Rejection};

/// Catch-all error type for the VectraHub backend.
#[derive(Debug, thiserror::Error)]
pub enum VectraError {
	/// Missing or malformed input, including CSRF failures.
	#[error("{0}")]
	Validation(String),
	#[error("{0}")]
	Unauthorized(String),
	#[error("Insufficient credits")]
	InsufficientCoins,
	#[error("{0}")]
	Forbidden(String),
	#[error("{0}")]
	NotFound(String),
	#[error("{0}")]
	Conflict(String),
	/// Stripe or the vectorization API failed or could not be reached.
	#[error("Upstream error: {0}")]
	Upstream(String),
	#[error("Database error: {0}")]
	Db(#[from] sqlx::Error),
	#[error("Internal error: {0}")]
	Internal(String),
}

impl VectraError {
	pub fn status_code(&self) -> StatusCode {
		match self {
			VectraError::Validation(_) => StatusCode::BAD_REQUEST,
			VectraError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
			VectraError::InsufficientCoins => StatusCode::PAYMENT_REQUIRED,
			VectraError::Forbidden(_) => StatusCode::FORBIDDEN,
			VectraError::NotFound(_) => StatusCode::NOT_FOUND,
			VectraError::Conflict(_) => StatusCode::CONFLICT,
			VectraError::Upstream(_) => StatusCode::BAD_GATEWAY,
			VectraError::Db(_) | VectraError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// The message shown to the client. Server-side failures are not leaked.
	fn public_message(&self) -> String {
		match self {
			VectraError::Upstream(_) => "Network error, please try again later".into(),
			VectraError::Db(_) | VectraError::Internal(_) => "Internal server error".into(),
			other => other.to_string(),
		}
	}
}

impl From<uuid::Error> for VectraError {
	fn from(e: uuid::Error) -> Self {
		VectraError::Validation(format!("Invalid UUID: {}", e))
	}
}

impl From<reqwest::Error> for VectraError {
	fn from(e: reqwest::Error) -> Self {
		VectraError::Upstream(e.to_string())
	}
}

impl From<bcrypt::BcryptError> for VectraError {
	fn from(e: bcrypt::BcryptError) -> Self {
		VectraError::Internal(e.to_string())
	}
}

/// Struct describing an error response.
#[derive(Debug)]
pub struct VectraResponseError {
	code: StatusCode,
	message: String,
}

impl VectraResponseError {
	pub fn new(code: StatusCode, message: String) -> Self {
		VectraResponseError { code, message }
	}
}

impl Serialize for VectraResponseError {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut map = serializer.serialize_map(Some(2))?;
		map.serialize_entry("success", &false)?;
		map.serialize_entry("error", &self.message)?;
		map.end()
	}
}

impl reject::Reject for VectraResponseError {}

impl From<VectraError> for VectraResponseError {
	fn from(err: VectraError) -> Self {
		let code = err.status_code();
		if code.is_server_error() {
			log::error!(target: "vectrahub", "Request failed with [error={}]", err);
			sentry_util::error(format!("{}", err));
		}

		VectraResponseError::new(code, err.public_message())
	}
}

impl From<VectraError> for Rejection {
	fn from(err: VectraError) -> Self {
		reject::custom(VectraResponseError::from(err))
	}
}

/// This function receives a `Rejection` and tries to return a custom value,
/// otherwise simply passes the rejection along.
pub async fn handle_rejection(err: Rejection) -> Result<impl warp::Reply, Infallible> {
	let response = if let Some(err) = err.find::<VectraResponseError>() {
		VectraResponseError::new(err.code, err.message.clone())
	} else if err.is_not_found() {
		VectraResponseError::new(StatusCode::NOT_FOUND, "Not found".into())
	} else if let Some(e) = err.find::<warp::reject::MissingHeader>() {
		VectraResponseError::new(StatusCode::BAD_REQUEST, e.to_string())
	} else if let Some(e) = err.find::<warp::reject::InvalidHeader>() {
		VectraResponseError::new(StatusCode::BAD_REQUEST, e.to_string())
	} else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
		VectraResponseError::new(StatusCode::BAD_REQUEST, e.to_string())
	} else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
		VectraResponseError::new(StatusCode::BAD_REQUEST, e.to_string())
	} else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
		VectraResponseError::new(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".into())
	} else if err.find::<warp::reject::LengthRequired>().is_some() {
		VectraResponseError::new(StatusCode::LENGTH_REQUIRED, "Content-Length required".into())
	} else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
		VectraResponseError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".into())
	} else {
		// We should have expected this... Just log and say its a 500.
		log::error!(target: "vectrahub", "Unhandled rejection: {:?}", err);

		VectraResponseError::new(
			StatusCode::INTERNAL_SERVER_ERROR,
			"Internal server error".into(),
		)
	};

	Ok(warp::reply::with_status(
		warp::reply::json(&response),
		response.code,
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_codes() {
		assert_eq!(
			VectraError::Validation("x".into()).status_code(),
			StatusCode::BAD_REQUEST
		);
		assert_eq!(
			VectraError::InsufficientCoins.status_code(),
			StatusCode::PAYMENT_REQUIRED
		);
		assert_eq!(
			VectraError::Upstream("timeout".into()).status_code(),
			StatusCode::BAD_GATEWAY
		);
	}

	#[test]
	fn test_upstream_message_is_generic() {
		let response = VectraResponseError::from(VectraError::Upstream(
			"connection refused to 10.0.0.3".into(),
		));
		assert_eq!(
			serde_json::to_string(&response).unwrap(),
			r#"{"success":false,"error":"Network error, please try again later"}"#
		);
	}

	#[test]
	fn test_validation_message_is_kept() {
		let response =
			VectraResponseError::from(VectraError::Validation("Invalid CSRF token".into()));
		assert_eq!(response.code, StatusCode::BAD_REQUEST);
		assert_eq!(
			serde_json::to_string(&response).unwrap(),
			r#"{"success":false,"error":"Invalid CSRF token"}"#
		);
	}
}
