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

use sentry::protocol::{Event, Level};
use std::{collections::BTreeMap, env};

pub const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Setup Sentry. An empty DSN disables it silently.
pub fn setup_sentry(dsn: &str) -> sentry::ClientInitGuard {
	log::info!(target: "vectrahub", "Running VectraHub v{}", CARGO_PKG_VERSION);

	let sentry = sentry::init(dsn);
	if sentry.is_enabled() {
		log::info!(target: "vectrahub", "Sentry is successfully set up.")
	}

	sentry
}

fn extra_fields() -> BTreeMap<String, sentry::protocol::Value> {
	let mut extra = BTreeMap::new();
	if let Ok(fly_alloc_id) = env::var("FLY_ALLOC_ID") {
		extra.insert("FLY_ALLOC_ID".into(), fly_alloc_id.into());
	}
	extra
}

/// Helper function to send an Info event to Sentry.
pub fn info(message: String) {
	sentry::capture_event(Event {
		extra: extra_fields(),
		level: Level::Info,
		message: Some(message),
		release: Some(CARGO_PKG_VERSION.into()),
		..Default::default()
	});
}

/// Helper function to send an Error event to Sentry.
pub fn error(message: String) {
	log::debug!(target: "vectrahub", "{}", message);

	sentry::capture_event(Event {
		extra: extra_fields(),
		level: Level::Error,
		message: Some(message),
		release: Some(CARGO_PKG_VERSION.into()),
		..Default::default()
	});
}
