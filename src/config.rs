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

//! Environment-driven configuration, read once at startup.

use std::{env, fmt, net::IpAddr, str::FromStr, sync::Arc, time::Duration};

/// Fallback used when `APP_SECRET` is unset. Only acceptable in development.
const DEV_APP_SECRET: &str = "vectrahub_dev_secret";

#[derive(Debug)]
pub struct ConfigError {
	var: &'static str,
	value: String,
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"Environment variable {} is malformed: {:?}",
			self.var, self.value
		)
	}
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppEnv {
	Development,
	Production,
}

#[derive(Clone, Debug)]
pub struct Config {
	pub app_env: AppEnv,
	pub app_url: String,
	pub app_secret: String,
	pub database_url: String,
	pub database_max_connections: u32,
	pub stripe_secret_key: String,
	pub stripe_publishable_key: String,
	pub stripe_webhook_secret: String,
	pub stripe_api_base: String,
	pub python_api_url: String,
	pub http_host: IpAddr,
	pub http_port: u16,
	pub session_lifetime: Duration,
	pub csrf_token_expiry: Duration,
	pub upload_max_size: u64,
	pub worker_concurrency: usize,
	pub expiry_sweep_interval: Duration,
	pub sentry_dsn: String,
}

/// Read a variable and parse it, falling back to `default` when unset.
fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
	match env::var(var) {
		Ok(value) => value.parse::<T>().map_err(|_| ConfigError { var, value }),
		Err(_) => Ok(default),
	}
}

/// Read a duration in whole seconds. Zero is refused: `tokio::time::interval`
/// panics on a zero period.
fn secs_var(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
	match parse_var(var, default)? {
		0 => Err(ConfigError {
			var,
			value: "0".into(),
		}),
		secs => Ok(Duration::from_secs(secs)),
	}
}

fn string_var(var: &str, default: &str) -> String {
	env::var(var).unwrap_or_else(|_| default.into())
}

impl Config {
	/// Build the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		let app_env = match env::var("APP_ENV").as_deref() {
			Ok("production") => AppEnv::Production,
			_ => AppEnv::Development,
		};

		let app_secret = env::var("APP_SECRET").unwrap_or_else(|_| {
			if app_env == AppEnv::Production {
				log::warn!(target: "vectrahub", "APP_SECRET is not set, using the development secret");
			}
			DEV_APP_SECRET.into()
		});

		Ok(Config {
			app_env,
			app_url: string_var("APP_URL", "https://vectrahub.online")
				.trim_end_matches('/')
				.to_string(),
			app_secret,
			database_url: string_var("DATABASE_URL", "postgres://localhost/vectrahub"),
			database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
			stripe_secret_key: string_var("STRIPE_SECRET_KEY", ""),
			stripe_publishable_key: string_var("STRIPE_PUBLISHABLE_KEY", ""),
			stripe_webhook_secret: string_var("STRIPE_WEBHOOK_SECRET", ""),
			stripe_api_base: string_var("STRIPE_API_BASE", "https://api.stripe.com")
				.trim_end_matches('/')
				.to_string(),
			python_api_url: string_var("PYTHON_API_URL", "http://127.0.0.1:5000")
				.trim_end_matches('/')
				.to_string(),
			http_host: parse_var("VH_HTTP_HOST", IpAddr::from([127, 0, 0, 1]))?,
			http_port: parse_var("PORT", 8080)?,
			session_lifetime: secs_var("SESSION_LIFETIME", 86400)?,
			csrf_token_expiry: secs_var("CSRF_TOKEN_EXPIRY", 3600)?,
			upload_max_size: parse_var("UPLOAD_MAX_SIZE", 5 * 1024 * 1024)?,
			worker_concurrency: parse_var("WORKER_CONCURRENCY", 4)?,
			expiry_sweep_interval: secs_var("EXPIRY_SWEEP_INTERVAL", 3600)?,
			sentry_dsn: string_var("VH_SENTRY_DSN", ""),
		})
	}

	pub fn is_production(&self) -> bool {
		self.app_env == AppEnv::Production
	}
}

impl Default for Config {
	/// Development defaults, mostly useful in tests.
	fn default() -> Self {
		Config {
			app_env: AppEnv::Development,
			app_url: "http://localhost:8080".into(),
			app_secret: DEV_APP_SECRET.into(),
			database_url: "postgres://localhost/vectrahub".into(),
			database_max_connections: 5,
			stripe_secret_key: String::new(),
			stripe_publishable_key: String::new(),
			stripe_webhook_secret: String::new(),
			stripe_api_base: "https://api.stripe.com".into(),
			python_api_url: "http://127.0.0.1:5000".into(),
			http_host: IpAddr::from([127, 0, 0, 1]),
			http_port: 8080,
			session_lifetime: Duration::from_secs(86400),
			csrf_token_expiry: Duration::from_secs(3600),
			upload_max_size: 5 * 1024 * 1024,
			worker_concurrency: 4,
			expiry_sweep_interval: Duration::from_secs(3600),
			sentry_dsn: String::new(),
		}
	}
}

/// Shared, read-only configuration handed to every route.
pub type SharedConfig = Arc<Config>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_var_falls_back_when_unset() {
		let port: u16 = parse_var("VH_TEST_UNSET_VARIABLE", 1234).unwrap();
		assert_eq!(port, 1234);
	}

	#[test]
	fn test_parse_var_rejects_garbage() {
		env::set_var("VH_TEST_BAD_PORT", "not-a-port");
		let err = parse_var::<u16>("VH_TEST_BAD_PORT", 8080).unwrap_err();
		assert_eq!(
			err.to_string(),
			r#"Environment variable VH_TEST_BAD_PORT is malformed: "not-a-port""#
		);
	}

	#[test]
	fn test_zero_interval_is_refused() {
		env::set_var("VH_TEST_ZERO_INTERVAL", "0");
		let err = secs_var("VH_TEST_ZERO_INTERVAL", 3600).unwrap_err();
		assert_eq!(
			err.to_string(),
			r#"Environment variable VH_TEST_ZERO_INTERVAL is malformed: "0""#
		);

		env::set_var("VH_TEST_HOURLY_INTERVAL", "3600");
		assert_eq!(
			secs_var("VH_TEST_HOURLY_INTERVAL", 60).unwrap(),
			Duration::from_secs(3600)
		);
	}
}
