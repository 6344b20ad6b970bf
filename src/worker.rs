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

//! Background execution of queued vectorization jobs.
//!
//! Each worker task claims one queued job at a time with
//! `FOR UPDATE SKIP LOCKED`, so several workers (and several processes) can
//! share the same queue without handing out a job twice.

use crate::db::PgPool;
use crate::errors::VectraError;
use crate::ledger::{self, CoinReason, VECTORIZE_COST};
use crate::models::image_job::{self, ImageJob, JobStatus};
use crate::vectorizer::VectorizerClient;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long an idle worker waits before polling the queue again.
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Back-off after a database error.
const ERROR_BACKOFF: Duration = Duration::from_secs(10);
/// A job still `processing` after this long has lost its worker. Well above
/// the vectorizer's own request timeouts.
pub const STALE_JOB_AFTER: Duration = Duration::from_secs(15 * 60);

/// Put jobs whose worker died back in the queue, or fail them when they
/// cannot be fetched again.
pub async fn reclaim_stale_jobs(
	pool: &PgPool,
	stale_after: Duration,
) -> Result<image_job::ReclaimedJobs, VectraError> {
	let mut conn = pool.acquire().await?;
	let reclaimed = image_job::reclaim_stale_jobs(&mut conn, stale_after.as_secs_f64()).await?;
	if reclaimed != image_job::ReclaimedJobs::default() {
		log::warn!(
			target: "vectrahub",
			"Reclaimed stale jobs: [requeued={}] [failed={}]",
			reclaimed.requeued,
			reclaimed.failed
		);
	}

	Ok(reclaimed)
}

/// Charge the job's cost and mark it done, atomically. Without enough coins
/// the job fails instead and nothing is charged.
pub async fn complete_job(pool: &PgPool, job: &ImageJob, svg_filename: &str) -> Result<JobStatus, VectraError> {
	let mut tx = pool.begin().await?;

	let debited = ledger::debit(&mut tx, job.user_id, VECTORIZE_COST, CoinReason::Vectorization).await;
	match debited {
		Ok(_) => {}
		Err(VectraError::InsufficientCoins) => {
			drop(tx);
			image_job::mark_job_failed(pool, job.id, "Insufficient credits").await?;
			return Err(VectraError::InsufficientCoins);
		}
		Err(e) => return Err(e),
	}
	image_job::mark_job_done(&mut tx, job.id, svg_filename, VECTORIZE_COST).await?;
	tx.commit().await?;

	log::debug!(
		target: "vectrahub",
		"Finished [job_id={}] for [user_id={}] with [svg={}]",
		job.id,
		job.user_id,
		svg_filename
	);

	Ok(JobStatus::Done)
}

/// Run one claimed job through the vectorization service.
pub async fn process_job(
	pool: &PgPool,
	vectorizer: &VectorizerClient,
	job: &ImageJob,
) -> Result<JobStatus, VectraError> {
	let url = match job.input_url.as_deref() {
		Some(url) => url,
		None => {
			image_job::mark_job_failed(pool, job.id, "Job has no source URL").await?;
			return Ok(JobStatus::Failed);
		}
	};

	match vectorizer.vectorize_url(url, job.mode).await {
		Ok(output) => match complete_job(pool, job, &output.svg_filename).await {
			Ok(status) => Ok(status),
			Err(VectraError::InsufficientCoins) => Ok(JobStatus::Failed),
			Err(e) => Err(e),
		},
		Err(e) => {
			log::warn!(
				target: "vectrahub",
				"Vectorization failed for [job_id={}] [url={}] with [error={}]",
				job.id,
				url,
				e
			);
			image_job::mark_job_failed(pool, job.id, &e.to_string()).await?;
			Ok(JobStatus::Failed)
		}
	}
}

async fn run_worker(worker_id: usize, pool: PgPool, vectorizer: VectorizerClient) {
	log::info!(target: "vectrahub", "Started bulk worker [worker_id={}]", worker_id);

	loop {
		let job = match image_job::claim_next_queued_job(&pool).await {
			Ok(Some(job)) => job,
			Ok(None) => {
				tokio::time::sleep(IDLE_POLL_INTERVAL).await;
				continue;
			}
			Err(e) => {
				log::error!(
					target: "vectrahub",
					"Worker [worker_id={}] failed to claim a job with [error={}]",
					worker_id,
					e
				);
				tokio::time::sleep(ERROR_BACKOFF).await;
				continue;
			}
		};

		log::debug!(
			target: "vectrahub",
			"Worker [worker_id={}] claimed [job_id={}]",
			worker_id,
			job.id
		);

		if let Err(e) = process_job(&pool, &vectorizer, &job).await {
			// The job stays `processing` until the sweep reclaims it.
			log::error!(
				target: "vectrahub",
				"Worker [worker_id={}] could not record result of [job_id={}] with [error={}]",
				worker_id,
				job.id,
				e
			);
			crate::sentry_util::error(format!("Bulk job {} failed to save: {}", job.id, e));
		}
	}
}

/// Spawn `concurrency` worker tasks on the current runtime.
pub fn spawn_workers(pool: PgPool, vectorizer: VectorizerClient, concurrency: usize) -> Vec<JoinHandle<()>> {
	(0..concurrency.max(1))
		.map(|worker_id| tokio::spawn(run_worker(worker_id, pool.clone(), vectorizer.clone())))
		.collect()
}
