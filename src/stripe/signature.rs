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

//! Verification of the `Stripe-Signature` header.
//!
//! The header looks like `t=1614556800,v1=5257a8...,v1=...`. Each `v1` is the
//! hex HMAC-SHA256 of `"{t}.{raw body}"` keyed with the endpoint secret.
//! Several `v1` entries appear while a secret is being rolled.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a signed timestamp, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
	#[error("Malformed Stripe-Signature header")]
	MalformedHeader,
	#[error("No v1 signature in Stripe-Signature header")]
	MissingSignature,
	#[error("Timestamp outside the tolerance zone")]
	Expired,
	#[error("No signature matches the payload")]
	Mismatch,
}

/// Hex-encoded signature of `payload` at `timestamp`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
	let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
		Ok(mac) => mac,
		Err(_) => unreachable!("HMAC takes keys of any size"),
	};
	mac.update(timestamp.to_string().as_bytes());
	mac.update(b".");
	mac.update(payload);

	hex::encode(mac.finalize().into_bytes())
}

/// Check `header` against `payload`. `now` is the current unix time in
/// seconds, and a timestamp more than `tolerance_secs` away from it, in
/// either direction, is refused.
pub fn verify_signature(
	payload: &[u8],
	header: &str,
	secret: &str,
	now: i64,
	tolerance_secs: i64,
) -> Result<(), SignatureError> {
	let mut timestamp: Option<i64> = None;
	let mut signatures: Vec<&str> = Vec::new();

	for part in header.split(',') {
		let mut kv = part.trim().splitn(2, '=');
		match (kv.next(), kv.next()) {
			(Some("t"), Some(value)) => {
				timestamp = Some(value.parse().map_err(|_| SignatureError::MalformedHeader)?);
			}
			(Some("v1"), Some(value)) => signatures.push(value),
			// Other schemes (v0 for test mode) are ignored.
			(Some(_), Some(_)) => {}
			_ => return Err(SignatureError::MalformedHeader),
		}
	}

	let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
	if signatures.is_empty() {
		return Err(SignatureError::MissingSignature);
	}

	let expected = compute_signature(secret, timestamp, payload);
	let matches = signatures
		.iter()
		.any(|candidate| bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())));
	if !matches {
		return Err(SignatureError::Mismatch);
	}

	if tolerance_secs > 0 && (now - timestamp).abs() > tolerance_secs {
		return Err(SignatureError::Expired);
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	const SECRET: &str = "whsec_test_secret";
	const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
	const NOW: i64 = 1_700_000_000;

	fn header_for(timestamp: i64, secret: &str) -> String {
		format!("t={},v1={}", timestamp, compute_signature(secret, timestamp, PAYLOAD))
	}

	#[test]
	fn test_valid_signature() {
		let header = header_for(NOW, SECRET);
		assert_eq!(verify_signature(PAYLOAD, &header, SECRET, NOW, 300), Ok(()));
	}

	#[test]
	fn test_any_v1_may_match() {
		let good = compute_signature(SECRET, NOW, PAYLOAD);
		let header = format!("t={},v1=deadbeef,v0=cafe,v1={}", NOW, good);
		assert_eq!(verify_signature(PAYLOAD, &header, SECRET, NOW, 300), Ok(()));
	}

	#[test]
	fn test_wrong_secret() {
		let header = header_for(NOW, "whsec_other");
		assert_eq!(
			verify_signature(PAYLOAD, &header, SECRET, NOW, 300),
			Err(SignatureError::Mismatch)
		);
	}

	#[test]
	fn test_tampered_payload() {
		let header = header_for(NOW, SECRET);
		assert_eq!(
			verify_signature(br#"{"id":"evt_2"}"#, &header, SECRET, NOW, 300),
			Err(SignatureError::Mismatch)
		);
	}

	#[test]
	fn test_old_timestamp() {
		let header = header_for(NOW - 301, SECRET);
		assert_eq!(
			verify_signature(PAYLOAD, &header, SECRET, NOW, 300),
			Err(SignatureError::Expired)
		);
	}

	#[test]
	fn test_future_timestamp() {
		let header = header_for(NOW + 301, SECRET);
		assert_eq!(
			verify_signature(PAYLOAD, &header, SECRET, NOW, 300),
			Err(SignatureError::Expired)
		);

		let header = header_for(NOW + 30, SECRET);
		assert_eq!(verify_signature(PAYLOAD, &header, SECRET, NOW, 300), Ok(()));
	}

	#[test]
	fn test_malformed_headers() {
		assert_eq!(
			verify_signature(PAYLOAD, "garbage", SECRET, NOW, 300),
			Err(SignatureError::MalformedHeader)
		);
		assert_eq!(
			verify_signature(PAYLOAD, "t=abc,v1=00", SECRET, NOW, 300),
			Err(SignatureError::MalformedHeader)
		);
		assert_eq!(
			verify_signature(PAYLOAD, "v1=00", SECRET, NOW, 300),
			Err(SignatureError::MalformedHeader)
		);
		assert_eq!(
			verify_signature(PAYLOAD, &format!("t={}", NOW), SECRET, NOW, 300),
			Err(SignatureError::MissingSignature)
		);
	}
}
