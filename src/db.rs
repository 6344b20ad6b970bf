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

use crate::config::Config;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::convert::Infallible;
use warp::Filter;

pub type PgPool = Pool<Postgres>;

/// Postgres' unique_violation error code.
const UNIQUE_VIOLATION: &str = "23505";

/// Connect to the db, run pending migrations, and return the connection pool.
pub async fn connect_db(config: &Config) -> Result<PgPool, sqlx::Error> {
	let pool = PgPoolOptions::new()
		.max_connections(config.database_max_connections)
		.connect(config.database_url.as_str())
		.await?;

	sqlx::migrate!("./migrations").run(&pool).await?;
	log::info!(target: "vectrahub", "Database migrations are up to date.");

	Ok(pool)
}

/// Filter to add the DB connection into handlers.
pub fn with_db_pool(pool: PgPool) -> impl Filter<Extract = (PgPool,), Error = Infallible> + Clone {
	warp::any().map(move || pool.clone())
}

/// Whether the query failed on a unique constraint.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
		_ => false,
	}
}
