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

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, PgConnection, Postgres};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
	Queued,
	Processing,
	Done,
	Failed,
}

impl FromStr for JobStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"queued" => Ok(JobStatus::Queued),
			"processing" => Ok(JobStatus::Processing),
			"done" => Ok(JobStatus::Done),
			"failed" => Ok(JobStatus::Failed),
			_ => Err(format!("Unknown job status: {}", s)),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "vectorize_mode", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VectorizeMode {
	Color,
	Bw,
}

impl Default for VectorizeMode {
	fn default() -> Self {
		VectorizeMode::Color
	}
}

impl VectorizeMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			VectorizeMode::Color => "color",
			VectorizeMode::Bw => "bw",
		}
	}
}

impl FromStr for VectorizeMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"color" => Ok(VectorizeMode::Color),
			"bw" => Ok(VectorizeMode::Bw),
			_ => Err(format!("Unknown vectorize mode: {}", s)),
		}
	}
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ImageJob {
	pub id: i32,
	pub user_id: i32,
	pub original_filename: String,
	pub input_url: Option<String>,
	pub output_svg_path: Option<String>,
	pub status: JobStatus,
	pub mode: VectorizeMode,
	pub coins_used: i32,
	pub error: Option<String>,
	pub is_bulk: bool,
	pub bulk_group_id: Option<Uuid>,
	pub bulk_position: Option<i32>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Status counts of a bulk group.
#[derive(Debug, Default, Serialize, sqlx::FromRow)]
pub struct BulkCounts {
	pub total: i64,
	pub queued: i64,
	pub processing: i64,
	pub done: i64,
	pub failed: i64,
}

impl BulkCounts {
	/// Whether every job of the group reached a final status.
	pub fn is_finished(&self) -> bool {
		self.done + self.failed >= self.total
	}
}

#[derive(Debug, Default, Serialize, sqlx::FromRow)]
pub struct UserJobStats {
	pub total_jobs: i64,
	pub successful_jobs: i64,
	pub failed_jobs: i64,
	pub coins_spent: i64,
}

/// Filters for the admin job listing.
#[derive(Debug, Default)]
pub struct JobFilter {
	pub status: Option<JobStatus>,
	pub date: Option<NaiveDate>,
	pub user_id: Option<i32>,
}

const JOB_COLUMNS: &str = r#"id, user_id, original_filename, input_url, output_svg_path, status,
	mode, coins_used, error, is_bulk, bulk_group_id, bulk_position, created_at, updated_at"#;

/// Create a single-upload job, already in `processing` state.
pub async fn create_upload_job<'e, E>(
	executor: E,
	user_id: i32,
	original_filename: &str,
	mode: VectorizeMode,
) -> Result<ImageJob, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, ImageJob>(&format!(
		r#"
		INSERT INTO image_jobs (user_id, original_filename, status, mode)
		VALUES ($1, $2, 'processing', $3)
		RETURNING {}
		"#,
		JOB_COLUMNS
	))
	.bind(user_id)
	.bind(original_filename)
	.bind(mode)
	.fetch_one(executor)
	.await
}

/// Queue one bulk job per URL, all sharing `group_id`.
pub async fn create_bulk_jobs(
	conn: &mut PgConnection,
	user_id: i32,
	group_id: Uuid,
	urls: &[String],
	mode: VectorizeMode,
) -> Result<(), sqlx::Error> {
	for (position, url) in urls.iter().enumerate() {
		sqlx::query(
			r#"
			INSERT INTO image_jobs
				(user_id, original_filename, input_url, status, mode, is_bulk, bulk_group_id, bulk_position)
			VALUES ($1, $2, $3, 'queued', $4, TRUE, $5, $6)
			"#,
		)
		.bind(user_id)
		.bind(filename_from_url(url))
		.bind(url)
		.bind(mode)
		.bind(group_id)
		.bind(position as i32 + 1)
		.execute(&mut *conn)
		.await?;
	}

	Ok(())
}

/// Claim the oldest queued job that has a source URL, skipping rows other
/// workers hold.
pub async fn claim_next_queued_job<'e, E>(executor: E) -> Result<Option<ImageJob>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, ImageJob>(&format!(
		r#"
		UPDATE image_jobs
		SET status = 'processing', updated_at = NOW()
		WHERE id = (
			SELECT id FROM image_jobs
			WHERE status = 'queued' AND input_url IS NOT NULL
			ORDER BY created_at, id
			LIMIT 1
			FOR UPDATE SKIP LOCKED
		)
		RETURNING {}
		"#,
		JOB_COLUMNS
	))
	.fetch_optional(executor)
	.await
}

pub async fn mark_job_done(
	conn: &mut PgConnection,
	id: i32,
	output_svg_path: &str,
	coins_used: i32,
) -> Result<(), sqlx::Error> {
	sqlx::query(
		r#"
		UPDATE image_jobs
		SET status = 'done', output_svg_path = $2, coins_used = $3, error = NULL, updated_at = NOW()
		WHERE id = $1
		"#,
	)
	.bind(id)
	.bind(output_svg_path)
	.bind(coins_used)
	.execute(conn)
	.await?;

	Ok(())
}

pub async fn mark_job_failed<'e, E>(executor: E, id: i32, error: &str) -> Result<(), sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"UPDATE image_jobs SET status = 'failed', error = $2, updated_at = NOW() WHERE id = $1",
	)
	.bind(id)
	.bind(error)
	.execute(executor)
	.await?;

	Ok(())
}

/// Put a failed job back in the queue. Returns false when the job does not
/// exist, did not fail, or has no source URL for the worker to fetch again.
pub async fn requeue_failed_job<'e, E>(executor: E, id: i32) -> Result<bool, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query(
		r#"
		UPDATE image_jobs
		SET status = 'queued', error = NULL, updated_at = NOW()
		WHERE id = $1 AND status = 'failed' AND input_url IS NOT NULL
		"#,
	)
	.bind(id)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() == 1)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReclaimedJobs {
	pub requeued: u64,
	pub failed: u64,
}

/// Release jobs left `processing` for longer than `stale_after_secs` by a
/// worker or a request that died mid-flight. Jobs with a source URL go back
/// in the queue; uploads cannot be fetched again and fail.
pub async fn reclaim_stale_jobs(conn: &mut PgConnection, stale_after_secs: f64) -> Result<ReclaimedJobs, sqlx::Error> {
	let requeued = sqlx::query(
		r#"
		UPDATE image_jobs
		SET status = 'queued', updated_at = NOW()
		WHERE status = 'processing'
			AND input_url IS NOT NULL
			AND updated_at < NOW() - make_interval(secs => $1)
		"#,
	)
	.bind(stale_after_secs)
	.execute(&mut *conn)
	.await?;

	let failed = sqlx::query(
		r#"
		UPDATE image_jobs
		SET status = 'failed', error = 'Processing timed out', updated_at = NOW()
		WHERE status = 'processing'
			AND input_url IS NULL
			AND updated_at < NOW() - make_interval(secs => $1)
		"#,
	)
	.bind(stale_after_secs)
	.execute(&mut *conn)
	.await?;

	Ok(ReclaimedJobs {
		requeued: requeued.rows_affected(),
		failed: failed.rows_affected(),
	})
}

pub async fn get_job<'e, E>(executor: E, id: i32) -> Result<Option<ImageJob>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, ImageJob>(&format!("SELECT {} FROM image_jobs WHERE id = $1", JOB_COLUMNS))
		.bind(id)
		.fetch_optional(executor)
		.await
}

pub async fn get_user_job<'e, E>(executor: E, user_id: i32, id: i32) -> Result<Option<ImageJob>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, ImageJob>(&format!(
		"SELECT {} FROM image_jobs WHERE id = $1 AND user_id = $2",
		JOB_COLUMNS
	))
	.bind(id)
	.bind(user_id)
	.fetch_optional(executor)
	.await
}

/// Whether the user owns a finished job that produced `filename`.
pub async fn user_owns_output<'e, E>(executor: E, user_id: i32, filename: &str) -> Result<bool, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar(
		r#"
		SELECT EXISTS (
			SELECT 1 FROM image_jobs
			WHERE user_id = $1 AND output_svg_path = $2 AND status = 'done'
		)
		"#,
	)
	.bind(user_id)
	.bind(filename)
	.fetch_one(executor)
	.await
}

pub async fn delete_job<'e, E>(executor: E, id: i32) -> Result<bool, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query("DELETE FROM image_jobs WHERE id = $1")
		.bind(id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() == 1)
}

/// A user's jobs, newest first.
pub async fn list_user_jobs<'e, E>(
	executor: E,
	user_id: i32,
	limit: i64,
	offset: i64,
) -> Result<Vec<ImageJob>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, ImageJob>(&format!(
		r#"
		SELECT {} FROM image_jobs
		WHERE user_id = $1
		ORDER BY created_at DESC, id DESC
		LIMIT $2 OFFSET $3
		"#,
		JOB_COLUMNS
	))
	.bind(user_id)
	.bind(limit)
	.bind(offset)
	.fetch_all(executor)
	.await
}

pub async fn user_job_stats<'e, E>(executor: E, user_id: i32) -> Result<UserJobStats, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, UserJobStats>(
		r#"
		SELECT COUNT(*) AS total_jobs,
			COUNT(*) FILTER (WHERE status = 'done') AS successful_jobs,
			COUNT(*) FILTER (WHERE status = 'failed') AS failed_jobs,
			COALESCE(SUM(coins_used), 0)::BIGINT AS coins_spent
		FROM image_jobs
		WHERE user_id = $1
		"#,
	)
	.bind(user_id)
	.fetch_one(executor)
	.await
}

pub async fn bulk_group_counts<'e, E>(
	executor: E,
	user_id: i32,
	group_id: Uuid,
) -> Result<BulkCounts, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, BulkCounts>(
		r#"
		SELECT COUNT(*) AS total,
			COUNT(*) FILTER (WHERE status = 'queued') AS queued,
			COUNT(*) FILTER (WHERE status = 'processing') AS processing,
			COUNT(*) FILTER (WHERE status = 'done') AS done,
			COUNT(*) FILTER (WHERE status = 'failed') AS failed
		FROM image_jobs
		WHERE bulk_group_id = $1 AND user_id = $2
		"#,
	)
	.bind(group_id)
	.bind(user_id)
	.fetch_one(executor)
	.await
}

pub async fn list_bulk_group<'e, E>(
	executor: E,
	user_id: i32,
	group_id: Uuid,
) -> Result<Vec<ImageJob>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, ImageJob>(&format!(
		r#"
		SELECT {} FROM image_jobs
		WHERE bulk_group_id = $1 AND user_id = $2
		ORDER BY bulk_position
		"#,
		JOB_COLUMNS
	))
	.bind(group_id)
	.bind(user_id)
	.fetch_all(executor)
	.await
}

pub async fn list_jobs<'e, E>(
	executor: E,
	filter: &JobFilter,
	limit: i64,
	offset: i64,
) -> Result<Vec<ImageJob>, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, ImageJob>(&format!(
		r#"
		SELECT {} FROM image_jobs
		WHERE ($1::job_status IS NULL OR status = $1)
			AND ($2::DATE IS NULL OR created_at::DATE = $2)
			AND ($3::INTEGER IS NULL OR user_id = $3)
		ORDER BY created_at DESC, id DESC
		LIMIT $4 OFFSET $5
		"#,
		JOB_COLUMNS
	))
	.bind(filter.status)
	.bind(filter.date)
	.bind(filter.user_id)
	.bind(limit)
	.bind(offset)
	.fetch_all(executor)
	.await
}

pub async fn count_jobs<'e, E>(executor: E, filter: &JobFilter) -> Result<i64, sqlx::Error>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_scalar(
		r#"
		SELECT COUNT(*) FROM image_jobs
		WHERE ($1::job_status IS NULL OR status = $1)
			AND ($2::DATE IS NULL OR created_at::DATE = $2)
			AND ($3::INTEGER IS NULL OR user_id = $3)
		"#,
	)
	.bind(filter.status)
	.bind(filter.date)
	.bind(filter.user_id)
	.fetch_one(executor)
	.await
}

/// Last path segment of a URL, used as the job's display name.
pub fn filename_from_url(url: &str) -> String {
	let path = url.split(|c| c == '?' || c == '#').next().unwrap_or_default();
	match path.trim_end_matches('/').rsplit('/').next() {
		Some(name) if !name.is_empty() && !name.contains(':') => name.to_string(),
		_ => "image".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_filename_from_url() {
		assert_eq!(filename_from_url("https://cdn.example.com/a/logo.png"), "logo.png");
		assert_eq!(filename_from_url("https://cdn.example.com/a/logo.png?w=200#x"), "logo.png");
		assert_eq!(filename_from_url("https://cdn.example.com/"), "cdn.example.com");
		assert_eq!(filename_from_url("https://"), "image");
	}

	#[test]
	fn test_bulk_counts_finished() {
		let counts = BulkCounts {
			total: 3,
			queued: 0,
			processing: 1,
			done: 1,
			failed: 1,
		};
		assert!(!counts.is_finished());

		let counts = BulkCounts {
			processing: 0,
			done: 2,
			..counts
		};
		assert!(counts.is_finished());
	}

	#[test]
	fn test_parse_status_and_mode() {
		assert_eq!("failed".parse::<JobStatus>(), Ok(JobStatus::Failed));
		assert!("cancelled".parse::<JobStatus>().is_err());
		assert_eq!("bw".parse::<VectorizeMode>(), Ok(VectorizeMode::Bw));
	}
}
