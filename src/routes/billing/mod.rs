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


//! Plans, checkout, coupons and the billing overview.

pub mod checkout;
pub mod coupon;
pub mod overview;
pub mod plans;

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::stripe::StripeClient;
use warp::Filter;

pub fn routes(
	pool: PgPool,
	config: SharedConfig,
	stripe: StripeClient,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	plans::get_plans(pool.clone())
		.or(checkout::post_checkout(pool.clone(), config.clone(), stripe))
		.or(coupon::post_check_coupon(pool.clone(), config.clone()))
		.or(coupon::post_apply_coupon(pool.clone(), config.clone()))
		.or(overview::get_billing(pool, config))
}
