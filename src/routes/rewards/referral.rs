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


//! This file implements the `GET /r/{code}` referral landing and the
//! `GET /api/referral/stats` endpoint.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::ledger::REFERRAL_SIGNUP_BONUS;
use crate::models::referral::{
	create_referral_link, get_referral_code, get_referrer_by_code, normalize_referral_code,
	record_click, recent_signups, referral_counts, ReferralCounts, ReferralSignup,
};
use crate::session::{with_session, Session};
use serde::Serialize;
use warp::{http::Uri, Filter};

/// Number of signups listed on the referral page.
const RECENT_SIGNUPS: i64 = 5;

#[derive(Debug, Serialize)]
struct ReferralStatsResponse {
	referral_code: String,
	referral_link: String,
	bonus_per_signup: i32,
	#[serde(flatten)]
	counts: ReferralCounts,
	recent_signups: Vec<ReferralSignup>,
}

/// Where a referral link sends the visitor.
pub fn register_url(app_url: &str, code: Option<&str>) -> String {
	match code {
		Some(code) => format!("{}/register?ref={}", app_url, code),
		None => format!("{}/register", app_url),
	}
}

pub fn referral_link(app_url: &str, code: &str) -> String {
	format!("{}/r/{}", app_url, code)
}

async fn referral_redirect(
	code: String,
	pool: PgPool,
	config: SharedConfig,
) -> Result<impl warp::Reply, warp::Rejection> {
	let code = normalize_referral_code(&code);

	if let Some(code) = &code {
		match get_referrer_by_code(&pool, code).await.map_err(VectraError::from)? {
			Some(referrer) => record_click(&pool, referrer).await.map_err(VectraError::from)?,
			None => log::info!(target: "vectrahub", "Click on unknown referral [code={}]", code),
		}
	}

	let target: Uri = register_url(&config.app_url, code.as_deref())
		.parse()
		.map_err(|e| VectraError::Internal(format!("Invalid redirect URL: {}", e)))?;

	Ok(warp::redirect::temporary(target))
}

async fn referral_stats(
	session: Session,
	pool: PgPool,
	config: SharedConfig,
) -> Result<impl warp::Reply, warp::Rejection> {
	let user_id = session.user_id();

	// Accounts created before referral links existed get one on first visit.
	let referral_code = match get_referral_code(&pool, user_id).await.map_err(VectraError::from)? {
		Some(code) => code,
		None => {
			let mut conn = pool.acquire().await.map_err(VectraError::from)?;
			create_referral_link(&mut conn, user_id).await.map_err(VectraError::from)?
		}
	};
	let counts = referral_counts(&pool, user_id).await.map_err(VectraError::from)?;
	let recent_signups = recent_signups(&pool, user_id, RECENT_SIGNUPS)
		.await
		.map_err(VectraError::from)?;

	Ok(warp::reply::json(&ReferralStatsResponse {
		referral_link: referral_link(&config.app_url, &referral_code),
		referral_code,
		bonus_per_signup: REFERRAL_SIGNUP_BONUS,
		counts,
		recent_signups,
	}))
}

/// `GET /r/{code}` endpoint.
pub fn get_referral_redirect(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("r" / String)
		.and(warp::get())
		.and_then(move |code| referral_redirect(code, pool.clone(), config.clone()))
		.with(warp::log("vectrahub"))
}

/// `GET /api/referral/stats` endpoint.
pub fn get_referral_stats(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "referral" / "stats")
		.and(warp::get())
		.and(with_session(pool.clone(), config.clone()))
		.and_then(move |session| referral_stats(session, pool.clone(), config.clone()))
		.with(warp::log("vectrahub"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_register_url() {
		assert_eq!(
			register_url("https://vectrahub.online", Some("AB12CD34")),
			"https://vectrahub.online/register?ref=AB12CD34"
		);
		assert_eq!(
			register_url("https://vectrahub.online", None),
			"https://vectrahub.online/register"
		);
		assert_eq!(
			referral_link("http://localhost:8080", "AB12CD34"),
			"http://localhost:8080/r/AB12CD34"
		);
	}
}
