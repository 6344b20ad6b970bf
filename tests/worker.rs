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


mod common;

use common::{create_test_user, setup_pool, teardown};
use vectrahub_backend::{
	models::image_job::{create_bulk_jobs, create_upload_job, get_job, JobStatus, VectorizeMode},
	worker::{reclaim_stale_jobs, STALE_JOB_AFTER},
};

async fn backdate(pool: &sqlx::PgPool, job_id: i32, minutes: i32) {
	sqlx::query(
		"UPDATE image_jobs SET status = 'processing', updated_at = NOW() - make_interval(mins => $2) WHERE id = $1",
	)
	.bind(job_id)
	.bind(minutes)
	.execute(pool)
	.await
	.expect("Backdate job shouldn't error. qed.");
}

#[tokio::test]
async fn test_stale_processing_jobs_are_reclaimed() {
	let pool = match setup_pool().await {
		Some(pool) => pool,
		None => return,
	};
	let user = create_test_user(&pool).await;

	let group_id = uuid::Uuid::new_v4();
	let mut conn = pool.acquire().await.unwrap();
	create_bulk_jobs(
		&mut conn,
		user.id,
		group_id,
		&[
			"https://cdn.vectrahub.test/stale.png".to_string(),
			"https://cdn.vectrahub.test/busy.png".to_string(),
		],
		VectorizeMode::Color,
	)
	.await
	.unwrap();
	drop(conn);
	let bulk_ids: Vec<i32> =
		sqlx::query_scalar("SELECT id FROM image_jobs WHERE bulk_group_id = $1 ORDER BY bulk_position")
			.bind(group_id)
			.fetch_all(&pool)
			.await
			.unwrap();
	let (stale_bulk, busy_bulk) = (bulk_ids[0], bulk_ids[1]);
	let upload = create_upload_job(&pool, user.id, "logo.png", VectorizeMode::Color)
		.await
		.unwrap();

	backdate(&pool, stale_bulk, 60).await;
	backdate(&pool, busy_bulk, 1).await;
	backdate(&pool, upload.id, 60).await;

	let reclaimed = reclaim_stale_jobs(&pool, STALE_JOB_AFTER).await.unwrap();
	assert!(reclaimed.requeued >= 1);
	assert!(reclaimed.failed >= 1);

	let job = get_job(&pool, stale_bulk).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Queued);

	let job = get_job(&pool, busy_bulk).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Processing);

	let job = get_job(&pool, upload.id).await.unwrap().unwrap();
	assert_eq!(job.status, JobStatus::Failed);
	assert_eq!(job.error.as_deref(), Some("Processing timed out"));

	teardown(&pool, &[user.id], &[]).await;
}
