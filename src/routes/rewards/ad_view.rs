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


//! This file implements the `GET /api/ad-view` and `POST /api/ad-view`
//! endpoints.

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::ledger::{ad_views_today, record_ad_view, AD_VIEW_REWARD, MAX_AD_VIEWS_PER_DAY};
use crate::session::{with_csrf_session, with_session, Session};
use serde::Serialize;
use warp::Filter;

#[derive(Debug, Serialize)]
struct AdViewStatus {
	current_views: i64,
	max_views: i64,
	coins_per_view: i32,
}

#[derive(Debug, Serialize)]
struct AdViewResponse {
	success: bool,
	coins_awarded: i32,
	current_views: i64,
	max_views: i64,
	coins: i32,
}

async fn ad_view_status(session: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let current_views = ad_views_today(&pool, session.user_id())
		.await
		.map_err(VectraError::from)?;

	Ok(warp::reply::json(&AdViewStatus {
		current_views,
		max_views: MAX_AD_VIEWS_PER_DAY,
		coins_per_view: AD_VIEW_REWARD,
	}))
}

async fn ad_view(session: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let reward = record_ad_view(&pool, session.user_id()).await?;

	log::debug!(
		target: "vectrahub",
		"Rewarded ad view for [user_id={}], [views_today={}]",
		session.user_id(),
		reward.views_today
	);

	Ok(warp::reply::json(&AdViewResponse {
		success: true,
		coins_awarded: reward.coins_awarded,
		current_views: reward.views_today,
		max_views: MAX_AD_VIEWS_PER_DAY,
		coins: reward.balance,
	}))
}

/// `GET /api/ad-view` endpoint: today's view count.
pub fn get_ad_view(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "ad-view")
		.and(warp::get())
		.and(with_session(pool.clone(), config))
		.and_then(move |session| ad_view_status(session, pool.clone()))
		.with(warp::log("vectrahub"))
}

/// `POST /api/ad-view` endpoint: reward one watched ad.
pub fn post_ad_view(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	warp::path!("api" / "ad-view")
		.and(warp::post())
		.and(with_csrf_session(pool.clone(), config))
		.and_then(move |session| ad_view(session, pool.clone()))
		.with(warp::log("vectrahub"))
}
