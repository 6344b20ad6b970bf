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


use dotenv::dotenv;
use std::sync::Arc;
use vectrahub_backend::{
	config::Config,
	cron::spawn_expiry_sweep,
	db::connect_db,
	routes::create_routes,
	sentry_util::setup_sentry,
	stripe::StripeClient,
	vectorizer::VectorizerClient,
	worker::spawn_workers,
};

/// Run the HTTP server, the bulk workers and the expiry sweep.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	// Read from .env file if present.
	let _ = dotenv();

	env_logger::init();

	let config = Arc::new(Config::from_env()?);
	let _guard = setup_sentry(&config.sentry_dsn);

	if config.stripe_webhook_secret.is_empty() {
		log::warn!(target: "vectrahub", "STRIPE_WEBHOOK_SECRET is not set, Stripe webhooks will be refused");
	}

	let pool = connect_db(&config).await?;
	let vectorizer = VectorizerClient::new(&config.python_api_url)?;
	let stripe = StripeClient::new(&config)?;

	let _workers = spawn_workers(pool.clone(), vectorizer.clone(), config.worker_concurrency);
	let _sweep = spawn_expiry_sweep(pool.clone(), config.expiry_sweep_interval);

	let routes = create_routes(pool, config.clone(), vectorizer, stripe);

	log::info!(
		target: "vectrahub",
		"Server is listening on {}:{}.",
		config.http_host,
		config.http_port
	);
	warp::serve(routes).run((config.http_host, config.http_port)).await;

	Ok(())
}
