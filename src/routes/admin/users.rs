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


//! This file implements the `/api/admin/users` endpoints: listing, details,
//! update and deletion.

use super::{audit, non_empty, ADMIN_PAGE_SIZE};
use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::ledger::{self, CoinReason};
use crate::models::{
	image_job::user_job_stats,
	payment::list_user_payments,
	subscription::get_active_subscription,
	user::{count_users, delete_user, get_user_by_id, list_users, update_user, UserRole, UserSummary},
	Pagination,
};
use crate::routes::json_body;
use crate::session::{client_ip, with_admin, with_admin_csrf, Session};
use serde::{Deserialize, Serialize};
use warp::Filter;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserListQuery {
	pub page: Option<i64>,
	pub search: Option<String>,
	/// Role filter, `user` or `admin`.
	pub filter: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UpdateUserRequest {
	pub full_name: Option<String>,
	pub role: Option<UserRole>,
	pub coins: Option<i32>,
}

#[derive(Debug, Serialize)]
struct UserListResponse {
	users: Vec<UserSummary>,
	page: i64,
	total: i64,
	total_pages: i64,
}

fn parse_role(filter: Option<&str>) -> Result<Option<UserRole>, VectraError> {
	match filter {
		None => Ok(None),
		Some("user") => Ok(Some(UserRole::User)),
		Some("admin") => Ok(Some(UserRole::Admin)),
		Some(other) => Err(VectraError::Validation(format!("Unknown role: {}", other))),
	}
}

async fn user_list(
	query: UserListQuery,
	_admin: Session,
	pool: PgPool,
) -> Result<impl warp::Reply, warp::Rejection> {
	let pagination = Pagination::new(query.page, None, ADMIN_PAGE_SIZE);
	let search = non_empty(&query.search);
	let role = parse_role(non_empty(&query.filter))?;

	let users = list_users(&pool, search, role, pagination.limit, pagination.offset())
		.await
		.map_err(VectraError::from)?;
	let total = count_users(&pool, search, role).await.map_err(VectraError::from)?;

	Ok(warp::reply::json(&UserListResponse {
		users,
		page: pagination.page,
		total,
		total_pages: pagination.total_pages(total),
	}))
}

async fn user_details(user_id: i32, _admin: Session, pool: PgPool) -> Result<impl warp::Reply, warp::Rejection> {
	let user = get_user_by_id(&pool, user_id)
		.await
		.map_err(VectraError::from)?
		.ok_or_else(|| VectraError::NotFound("User not found".into()))?;
	let subscription = get_active_subscription(&pool, user_id)
		.await
		.map_err(VectraError::from)?;
	let jobs = user_job_stats(&pool, user_id).await.map_err(VectraError::from)?;
	let payments = list_user_payments(&pool, user_id)
		.await
		.map_err(VectraError::from)?;

	Ok(warp::reply::json(&serde_json::json!({
		"user": user,
		"subscription": subscription,
		"jobs": jobs,
		"payments": payments,
	})))
}

async fn user_update(
	user_id: i32,
	admin: Session,
	body: UpdateUserRequest,
	ip_address: Option<String>,
	pool: PgPool,
) -> Result<impl warp::Reply, warp::Rejection> {
	let full_name = body.full_name.as_deref().map(str::trim);
	if full_name == Some("") {
		return Err(VectraError::Validation("Full name cannot be empty".into()).into());
	}
	if user_id == admin.user_id() && body.role == Some(UserRole::User) {
		return Err(VectraError::Validation("You cannot remove your own admin role".into()).into());
	}

	let mut tx = pool.begin().await.map_err(VectraError::from)?;
	let mut user = update_user(&mut tx, user_id, full_name, body.role)
		.await
		.map_err(VectraError::from)?
		.ok_or_else(|| VectraError::NotFound("User not found".into()))?;
	if let Some(coins) = body.coins {
		user.coins = ledger::set_balance(&mut tx, user_id, coins, CoinReason::AdminAdjustment).await?;
	}
	audit(
		&mut *tx,
		&admin,
		&format!("Updated user {} ({})", user.id, user.email),
		ip_address.as_deref(),
	)
	.await?;
	tx.commit().await.map_err(VectraError::from)?;

	Ok(warp::reply::json(&serde_json::json!({
		"success": true,
		"user": user,
	})))
}

async fn user_delete(
	user_id: i32,
	admin: Session,
	ip_address: Option<String>,
	pool: PgPool,
) -> Result<impl warp::Reply, warp::Rejection> {
	if user_id == admin.user_id() {
		return Err(VectraError::Validation("You cannot delete your own account".into()).into());
	}

	let mut tx = pool.begin().await.map_err(VectraError::from)?;
	if !delete_user(&mut *tx, user_id).await.map_err(VectraError::from)? {
		return Err(VectraError::NotFound("User not found".into()).into());
	}
	audit(&mut *tx, &admin, &format!("Deleted user {}", user_id), ip_address.as_deref()).await?;
	tx.commit().await.map_err(VectraError::from)?;

	Ok(warp::reply::json(&serde_json::json!({ "success": true })))
}

pub fn routes(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	let list = {
		let pool = pool.clone();
		warp::path!("api" / "admin" / "users")
			.and(warp::get())
			.and(warp::query::<UserListQuery>())
			.and(with_admin(pool.clone(), config.clone()))
			.and_then(move |query, admin| user_list(query, admin, pool.clone()))
	};
	let details = {
		let pool = pool.clone();
		warp::path!("api" / "admin" / "users" / i32)
			.and(warp::get())
			.and(with_admin(pool.clone(), config.clone()))
			.and_then(move |user_id, admin| user_details(user_id, admin, pool.clone()))
	};
	let update = {
		let pool = pool.clone();
		warp::path!("api" / "admin" / "users" / i32)
			.and(warp::put())
			.and(with_admin_csrf(pool.clone(), config.clone()))
			.and(json_body())
			.and(client_ip())
			.and_then(move |user_id, admin, body, ip| user_update(user_id, admin, body, ip, pool.clone()))
	};
	let delete = warp::path!("api" / "admin" / "users" / i32)
		.and(warp::delete())
		.and(with_admin_csrf(pool.clone(), config))
		.and(client_ip())
		.and_then(move |user_id, admin, ip| user_delete(user_id, admin, ip, pool.clone()));

	list.or(details)
		.or(update)
		.or(delete)
		// View access logs by setting `RUST_LOG=vectrahub`.
		.with(warp::log("vectrahub"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_role() {
		assert_eq!(parse_role(None).unwrap(), None);
		assert_eq!(parse_role(Some("admin")).unwrap(), Some(UserRole::Admin));
		assert!(parse_role(Some("root")).is_err());
	}
}
