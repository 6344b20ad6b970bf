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


//! VectraHub backend: accounts, billing reconciled from Stripe webhooks, a
//! coin ledger, and a proxy in front of the image vectorization service.

pub mod auth;
pub mod billing;
pub mod config;
pub mod cron;
pub mod db;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod routes;
pub mod sentry_util;
pub mod session;
pub mod stripe;
pub mod vectorizer;
pub mod worker;
