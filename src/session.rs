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

//! Server-side sessions and CSRF protection.
//!
//! The browser holds a random token in the `vh_session` cookie. The database
//! only stores an HMAC of that token keyed with `APP_SECRET`, so a leaked
//! sessions table cannot be replayed. Each session carries its own CSRF
//! token, which mutating endpoints expect back in the `x-csrf-token` header.

use crate::config::{Config, SharedConfig};
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::user::{get_user_by_id, User};
use chrono::Duration;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use sqlx::types::chrono::{DateTime, Utc};
use std::net::SocketAddr;
use subtle::ConstantTimeEq;
use warp::{Filter, Rejection};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "vh_session";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// An authenticated browser session.
#[derive(Clone, Debug)]
pub struct Session {
	pub id: i32,
	pub user: User,
	csrf_token: Option<String>,
	csrf_expires_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
	id: i32,
	user_id: i32,
	csrf_token: Option<String>,
	csrf_expires_at: Option<DateTime<Utc>>,
}

impl Session {
	pub fn user_id(&self) -> i32 {
		self.user.id
	}

	/// The CSRF token, if one was issued and is still valid at `now`.
	fn valid_csrf_token(&self, now: DateTime<Utc>) -> Option<&str> {
		match (&self.csrf_token, self.csrf_expires_at) {
			(Some(token), Some(expires_at)) if expires_at > now => Some(token.as_str()),
			_ => None,
		}
	}
}

/// 32 random bytes, hex-encoded.
pub fn generate_token() -> String {
	let bytes: [u8; 32] = rand::thread_rng().gen();
	hex::encode(bytes)
}

/// Keyed hash of a session token, as stored in the database.
pub fn hash_token(secret: &str, token: &str) -> String {
	let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
		Ok(mac) => mac,
		Err(_) => unreachable!("HMAC takes keys of any size"),
	};
	mac.update(token.as_bytes());

	hex::encode(mac.finalize().into_bytes())
}

fn to_chrono(duration: std::time::Duration) -> Duration {
	Duration::seconds(duration.as_secs() as i64)
}

/// Open a session for `user_id` and return the raw token for the cookie.
pub async fn create_session(pool: &PgPool, config: &Config, user_id: i32) -> Result<String, VectraError> {
	let token = generate_token();
	let expires_at = Utc::now() + to_chrono(config.session_lifetime);

	sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND expires_at < NOW()")
		.bind(user_id)
		.execute(pool)
		.await?;
	sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
		.bind(hash_token(&config.app_secret, &token))
		.bind(user_id)
		.bind(expires_at)
		.execute(pool)
		.await?;

	Ok(token)
}

/// Look up an unexpired session by its raw token.
pub async fn load_session(pool: &PgPool, config: &Config, token: &str) -> Result<Option<Session>, VectraError> {
	let row = sqlx::query_as::<_, SessionRow>(
		r#"
		SELECT id, user_id, csrf_token, csrf_expires_at FROM sessions
		WHERE token_hash = $1 AND expires_at > NOW()
		"#,
	)
	.bind(hash_token(&config.app_secret, token))
	.fetch_optional(pool)
	.await?;

	let row = match row {
		Some(row) => row,
		None => return Ok(None),
	};
	let user = match get_user_by_id(pool, row.user_id).await? {
		Some(user) => user,
		None => return Ok(None),
	};

	Ok(Some(Session {
		id: row.id,
		user,
		csrf_token: row.csrf_token,
		csrf_expires_at: row.csrf_expires_at,
	}))
}

pub async fn destroy_session(pool: &PgPool, session_id: i32) -> Result<(), VectraError> {
	sqlx::query("DELETE FROM sessions WHERE id = $1")
		.bind(session_id)
		.execute(pool)
		.await?;

	Ok(())
}

/// Return the session's CSRF token, issuing a new one when it is missing or
/// expired.
pub async fn ensure_csrf_token(
	pool: &PgPool,
	config: &Config,
	session: &Session,
) -> Result<String, VectraError> {
	if let Some(token) = session.valid_csrf_token(Utc::now()) {
		return Ok(token.to_string());
	}

	let token = generate_token();
	sqlx::query("UPDATE sessions SET csrf_token = $2, csrf_expires_at = $3 WHERE id = $1")
		.bind(session.id)
		.bind(&token)
		.bind(Utc::now() + to_chrono(config.csrf_token_expiry))
		.execute(pool)
		.await?;

	Ok(token)
}

/// Compare the submitted token with the session's, in constant time.
pub fn check_csrf(session: &Session, submitted: Option<&str>, now: DateTime<Utc>) -> Result<(), VectraError> {
	let invalid = || VectraError::Validation("Invalid CSRF token".into());

	let expected = session.valid_csrf_token(now).ok_or_else(invalid)?;
	let submitted = submitted.ok_or_else(invalid)?;
	if bool::from(expected.as_bytes().ct_eq(submitted.as_bytes())) {
		Ok(())
	} else {
		Err(invalid())
	}
}

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: &str, config: &Config) -> String {
	let mut cookie = format!(
		"{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
		SESSION_COOKIE,
		token,
		config.session_lifetime.as_secs()
	);
	if config.is_production() {
		cookie.push_str("; Secure");
	}
	cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn expired_session_cookie(config: &Config) -> String {
	let mut cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
	if config.is_production() {
		cookie.push_str("; Secure");
	}
	cookie
}

async fn authenticate(pool: &PgPool, config: &Config, token: Option<&str>) -> Result<Session, VectraError> {
	let token = token
		.filter(|t| !t.is_empty())
		.ok_or_else(|| VectraError::Unauthorized("Not logged in".into()))?;

	load_session(pool, config, token)
		.await?
		.ok_or_else(|| VectraError::Unauthorized("Session expired, please log in again".into()))
}

fn require_admin(session: Session) -> Result<Session, VectraError> {
	if session.user.is_admin() {
		Ok(session)
	} else {
		Err(VectraError::Forbidden("Admin access required".into()))
	}
}

/// Extract the logged-in user's session, or reject with 401.
pub fn with_session(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
	warp::cookie::optional(SESSION_COOKIE).and_then(move |token: Option<String>| {
		let pool = pool.clone();
		let config = config.clone();
		async move {
			authenticate(&pool, &config, token.as_deref())
				.await
				.map_err(Rejection::from)
		}
	})
}

/// Like `with_session`, and also require a valid `x-csrf-token` header.
pub fn with_csrf_session(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
	with_session(pool, config)
		.and(warp::header::optional::<String>(CSRF_HEADER))
		.and_then(|session: Session, submitted: Option<String>| async move {
			check_csrf(&session, submitted.as_deref(), Utc::now()).map_err(Rejection::from)?;
			Ok::<_, Rejection>(session)
		})
}

/// Session of an admin user; others get 403.
pub fn with_admin(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
	with_session(pool, config)
		.and_then(|session: Session| async move { require_admin(session).map_err(Rejection::from) })
}

/// Admin session with a valid CSRF header, for back-office mutations.
pub fn with_admin_csrf(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
	with_csrf_session(pool, config)
		.and_then(|session: Session| async move { require_admin(session).map_err(Rejection::from) })
}

/// Best guess of the client address: the first `x-forwarded-for` hop, else
/// the socket peer.
pub fn client_ip() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
	warp::header::optional::<String>("x-forwarded-for")
		.and(warp::addr::remote())
		.map(|forwarded: Option<String>, remote: Option<SocketAddr>| {
			forwarded
				.and_then(|f| f.split(',').next().map(|ip| ip.trim().to_string()))
				.filter(|ip| !ip.is_empty())
				.or_else(|| remote.map(|addr| addr.ip().to_string()))
		})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::AppEnv;
	use crate::models::user::UserRole;

	fn session(csrf_token: Option<&str>, expires_in: i64) -> Session {
		Session {
			id: 1,
			user: User {
				id: 7,
				full_name: "Ada".into(),
				email: "ada@example.com".into(),
				password_hash: String::new(),
				role: UserRole::User,
				coins: 0,
				created_at: Utc::now(),
				updated_at: Utc::now(),
			},
			csrf_token: csrf_token.map(String::from),
			csrf_expires_at: Some(Utc::now() + Duration::seconds(expires_in)),
		}
	}

	#[test]
	fn test_generate_token() {
		let a = generate_token();
		let b = generate_token();
		assert_eq!(a.len(), 64);
		assert_ne!(a, b);
	}

	#[test]
	fn test_hash_token_depends_on_secret() {
		assert_eq!(hash_token("s1", "token"), hash_token("s1", "token"));
		assert_ne!(hash_token("s1", "token"), hash_token("s2", "token"));
		assert_ne!(hash_token("s1", "token"), "token");
	}

	#[test]
	fn test_check_csrf() {
		let s = session(Some("abc123"), 3600);
		let now = Utc::now();
		assert!(check_csrf(&s, Some("abc123"), now).is_ok());
		assert!(check_csrf(&s, Some("abc124"), now).is_err());
		assert!(check_csrf(&s, None, now).is_err());
	}

	#[test]
	fn test_expired_csrf_is_refused() {
		let s = session(Some("abc123"), -1);
		let err = check_csrf(&s, Some("abc123"), Utc::now()).unwrap_err();
		assert_eq!(err.to_string(), "Invalid CSRF token");

		let s = session(None, 3600);
		assert!(check_csrf(&s, Some(""), Utc::now()).is_err());
	}

	#[test]
	fn test_require_admin() {
		let mut s = session(None, 0);
		assert!(matches!(require_admin(s.clone()), Err(VectraError::Forbidden(_))));
		s.user.role = UserRole::Admin;
		assert!(require_admin(s).is_ok());
	}

	#[test]
	fn test_cookies() {
		let mut config = Config::default();
		assert_eq!(
			session_cookie("tok", &config),
			"vh_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=86400"
		);
		config.app_env = AppEnv::Production;
		assert!(session_cookie("tok", &config).ends_with("; Secure"));
		assert!(expired_session_cookie(&config).contains("Max-Age=0"));
	}
}
