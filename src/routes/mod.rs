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

pub mod admin;
pub mod auth;
pub mod billing;
pub mod bulk;
pub mod dashboard;
pub mod rewards;
pub mod vectorize;
pub mod version;
pub mod webhook;

use super::errors;
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::stripe::StripeClient;
use crate::vectorizer::VectorizerClient;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use warp::Filter;

/// Largest JSON body accepted by the API.
const JSON_BODY_LIMIT: u64 = 1024 * 16;

/// JSON request body, rejecting huge payloads.
pub(crate) fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
	json_body_with_limit(JSON_BODY_LIMIT)
}

/// JSON request body of at most `limit` bytes.
pub(crate) fn json_body_with_limit<T: DeserializeOwned + Send>(
	limit: u64,
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
	warp::body::content_length_limit(limit).and(warp::body::json())
}

pub fn create_routes(
	pool: PgPool,
	config: SharedConfig,
	vectorizer: VectorizerClient,
	stripe: StripeClient,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
	version::get::get_version()
		.or(webhook::stripe::post_stripe_webhook(pool.clone(), config.clone()))
		.or(auth::routes(pool.clone(), config.clone()))
		.or(billing::routes(pool.clone(), config.clone(), stripe))
		.or(rewards::routes(pool.clone(), config.clone()))
		.or(vectorize::routes(pool.clone(), config.clone(), vectorizer))
		.or(bulk::routes(pool.clone(), config.clone()))
		.or(dashboard::routes(pool.clone(), config.clone()))
		.or(admin::routes(pool, config))
		.recover(errors::handle_rejection)
}
