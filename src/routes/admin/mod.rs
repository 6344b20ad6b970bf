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


//! The admin back-office under `/api/admin`. Every endpoint requires the
//! admin role, mutations also need the CSRF header and leave a system log
//! entry naming the admin.

pub mod activity;
pub mod jobs;
pub mod logs;
pub mod settings;
pub mod stats;
pub mod subscriptions;
pub mod users;

use crate::config::SharedConfig;
use crate::db::PgPool;
use crate::errors::VectraError;
use crate::models::activity_log::{log_system, ADMIN_ACTION};
use crate::session::Session;
use sqlx::types::chrono::NaiveDate;
use sqlx::{Executor, Postgres};
use warp::Filter;

/// Rows per page in admin listings.
pub const ADMIN_PAGE_SIZE: i64 = 10;

/// Blank query parameters count as absent.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
	value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse an optional `YYYY-MM-DD` query parameter.
pub fn parse_date(value: &Option<String>) -> Result<Option<NaiveDate>, VectraError> {
	non_empty(value)
		.map(|v| {
			NaiveDate::parse_from_str(v, "%Y-%m-%d")
				.map_err(|_| VectraError::Validation(format!("Invalid date: {}", v)))
		})
		.transpose()
}

/// Record an admin mutation in the system log.
pub async fn audit<'e, E>(
	executor: E,
	admin: &Session,
	description: &str,
	ip_address: Option<&str>,
) -> Result<(), VectraError>
where
	E: Executor<'e, Database = Postgres>,
{
	log::info!(
		target: "vectrahub",
		"Admin action by [admin_id={}]: {}",
		admin.user_id(),
		description
	);
	log_system(executor, ADMIN_ACTION, description, Some(admin.user_id()), ip_address).await?;

	Ok(())
}

pub fn routes(
	pool: PgPool,
	config: SharedConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	stats::get_admin_stats(pool.clone(), config.clone())
		.or(users::routes(pool.clone(), config.clone()))
		.or(jobs::routes(pool.clone(), config.clone()))
		.or(subscriptions::get_subscriptions(pool.clone(), config.clone()))
		.or(logs::get_system_logs(pool.clone(), config.clone()))
		.or(activity::get_recent_activity(pool.clone(), config.clone()))
		.or(settings::routes(pool, config))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_date() {
		assert_eq!(parse_date(&None).unwrap(), None);
		assert_eq!(parse_date(&Some("  ".into())).unwrap(), None);
		assert_eq!(
			parse_date(&Some("2024-06-01".into())).unwrap(),
			NaiveDate::from_ymd_opt(2024, 6, 1)
		);
		assert!(parse_date(&Some("01/06/2024".into())).is_err());
	}
}
