//! The job queue backend consumed by the worker pool.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use storyforge_core::types::DbId;
use storyforge_db::models::job::Job;
use storyforge_db::repositories::JobRepo;

/// Durable queue operations used by workers.
///
/// Every mutation returns `false` when the job was no longer active, which
/// workers treat as "someone else finished it" and ignore.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn claim_next(&self) -> Result<Option<Job>, sqlx::Error>;

    async fn update_progress(&self, job_id: DbId, percent: i16) -> Result<bool, sqlx::Error>;

    async fn complete(&self, job_id: DbId, result: &serde_json::Value)
        -> Result<bool, sqlx::Error>;

    async fn fail(&self, job_id: DbId, error: &str) -> Result<bool, sqlx::Error>;

    async fn retry_later(
        &self,
        job_id: DbId,
        error: &str,
        delay: Duration,
    ) -> Result<bool, sqlx::Error>;

    /// Returns `(requeued, failed)` counts.
    async fn requeue_stale(&self, lease: Duration) -> Result<(u64, u64), sqlx::Error>;

    async fn delete_expired(&self, retention_hours: i32) -> Result<u64, sqlx::Error>;
}

/// [`JobStore`] backed by the `jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn claim_next(&self) -> Result<Option<Job>, sqlx::Error> {
        JobRepo::claim_next(&self.pool).await
    }

    async fn update_progress(&self, job_id: DbId, percent: i16) -> Result<bool, sqlx::Error> {
        JobRepo::update_progress(&self.pool, job_id, percent).await
    }

    async fn complete(
        &self,
        job_id: DbId,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        JobRepo::complete(&self.pool, job_id, result).await
    }

    async fn fail(&self, job_id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        JobRepo::fail(&self.pool, job_id, error).await
    }

    async fn retry_later(
        &self,
        job_id: DbId,
        error: &str,
        delay: Duration,
    ) -> Result<bool, sqlx::Error> {
        JobRepo::retry_later(&self.pool, job_id, error, delay.as_secs_f64()).await
    }

    async fn requeue_stale(&self, lease: Duration) -> Result<(u64, u64), sqlx::Error> {
        JobRepo::requeue_stale(&self.pool, lease.as_secs_f64()).await
    }

    async fn delete_expired(&self, retention_hours: i32) -> Result<u64, sqlx::Error> {
        JobRepo::delete_expired(&self.pool, retention_hours).await
    }
}
