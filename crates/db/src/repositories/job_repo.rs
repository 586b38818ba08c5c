//! Repository for the `jobs` table.
//!
//! Every transition out of `active` is guarded by `WHERE status_id = active`,
//! so terminal states are final even when a stale worker reports late.

use sqlx::PgPool;
use storyforge_core::status::{JobStatus, StatusId};
use storyforge_core::types::DbId;

use crate::models::job::{Job, SubmitJob};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status_id, submitted_by, parameters, result, error_message, \
    progress_percent, attempts, max_attempts, run_after, \
    submitted_at, claimed_at, completed_at, created_at, updated_at";

/// Terminal statuses: completed, failed.
const TERMINAL_STATUSES: [StatusId; 2] = [
    JobStatus::Completed as StatusId,
    JobStatus::Failed as StatusId,
];

/// Provides the durable job queue.
pub struct JobRepo;

impl JobRepo {
    /// Enqueue a job. Returns immediately with the queued row.
    pub async fn submit(
        pool: &PgPool,
        user_id: DbId,
        input: &SubmitJob,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (job_type, status_id, submitted_by, parameters, max_attempts) \
             VALUES ($1, $2, $3, $4, COALESCE($5, 3)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(&input.job_type)
            .bind(JobStatus::Queued.id())
            .bind(user_id)
            .bind(&input.parameters)
            .bind(input.max_attempts)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the oldest runnable queued job.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// claim the same row. Claiming counts as an attempt.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $1, claimed_at = NOW(), attempts = attempts + 1 \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status_id = $2 AND run_after <= NOW() \
                 ORDER BY submitted_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Active.id())
            .bind(JobStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Update progress of an active job. Returns `false` if the job is no
    /// longer active.
    pub async fn update_progress(
        pool: &PgPool,
        job_id: DbId,
        percent: i16,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET progress_percent = $2 WHERE id = $1 AND status_id = $3",
        )
        .bind(job_id)
        .bind(percent.clamp(0, 100))
        .bind(JobStatus::Active.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an active job completed with its result payload.
    pub async fn complete(
        pool: &PgPool,
        job_id: DbId,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, result = $3, error_message = NULL, \
                 progress_percent = 100, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.id())
        .bind(result)
        .bind(JobStatus::Active.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Mark an active job permanently failed.
    pub async fn fail(pool: &PgPool, job_id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(JobStatus::Active.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Put an active job back in the queue, runnable after `delay_secs`.
    pub async fn retry_later(
        pool: &PgPool,
        job_id: DbId,
        error: &str,
        delay_secs: f64,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, claimed_at = NULL, \
                 run_after = NOW() + make_interval(secs => $4) \
             WHERE id = $1 AND status_id = $5",
        )
        .bind(job_id)
        .bind(JobStatus::Queued.id())
        .bind(error)
        .bind(delay_secs)
        .bind(JobStatus::Active.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Recover jobs whose worker vanished: active jobs claimed more than
    /// `lease_secs` ago are requeued, or failed once out of attempts.
    ///
    /// Returns `(requeued, failed)`.
    pub async fn requeue_stale(pool: &PgPool, lease_secs: f64) -> Result<(u64, u64), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let failed = sqlx::query(
            "UPDATE jobs \
             SET status_id = $1, error_message = 'Lease expired after final attempt', \
                 completed_at = NOW() \
             WHERE status_id = $2 \
               AND claimed_at < NOW() - make_interval(secs => $3) \
               AND attempts >= max_attempts",
        )
        .bind(JobStatus::Failed.id())
        .bind(JobStatus::Active.id())
        .bind(lease_secs)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let requeued = sqlx::query(
            "UPDATE jobs \
             SET status_id = $1, claimed_at = NULL, run_after = NOW() \
             WHERE status_id = $2 \
               AND claimed_at < NOW() - make_interval(secs => $3)",
        )
        .bind(JobStatus::Queued.id())
        .bind(JobStatus::Active.id())
        .bind(lease_secs)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok((requeued, failed))
    }

    /// Delete terminal jobs that finished more than `retention_hours` ago.
    pub async fn delete_expired(pool: &PgPool, retention_hours: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM jobs \
             WHERE status_id IN ($1, $2) \
               AND completed_at < NOW() - make_interval(hours => $3)",
        )
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(retention_hours)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
