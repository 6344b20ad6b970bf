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

//! Periodic maintenance.

use crate::billing;
use crate::db::PgPool;
use crate::worker::{self, STALE_JOB_AFTER};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Run the subscription expiry sweep and reclaim stale jobs every
/// `interval`, starting right away.
pub fn spawn_expiry_sweep(pool: PgPool, interval: Duration) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(interval);
		loop {
			ticker.tick().await;
			if let Err(e) = billing::expire_overdue_subscriptions(&pool).await {
				log::error!(target: "vectrahub", "Expiry sweep failed with [error={}]", e);
				crate::sentry_util::error(format!("Expiry sweep failed: {}", e));
			}
			if let Err(e) = worker::reclaim_stale_jobs(&pool, STALE_JOB_AFTER).await {
				log::error!(target: "vectrahub", "Stale job sweep failed with [error={}]", e);
				crate::sentry_util::error(format!("Stale job sweep failed: {}", e));
			}
		}
	})
}
