//! The job worker pool.
//!
//! Workers loop independently: claim a job, run its handler, record the
//! outcome. Claiming relies on `FOR UPDATE SKIP LOCKED` in the store, so any
//! number of workers (in any number of processes) never run the same job
//! concurrently. Cancellation is only observed between jobs; a job that has
//! started runs to completion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use storyforge_core::job_events::{EVENT_JOB_COMPLETED, EVENT_JOB_FAILED};
use storyforge_db::models::job::Job;
use storyforge_events::{UpdateEvent, UpdateNotifier};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::error::JobError;
use crate::handler::{JobHandler, ProgressReporter};
use crate::store::JobStore;

/// Longest retry delay regardless of attempt count.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Retry delay after the `attempt`-th failed attempt: `base * 2^(attempt-1)`,
/// capped at [`MAX_BACKOFF`].
pub fn backoff_delay(base: Duration, attempt: i16) -> Duration {
    let exponent = u32::try_from(attempt.max(1) - 1).unwrap_or(0).min(16);
    base.saturating_mul(1 << exponent).min(MAX_BACKOFF)
}

pub struct JobWorkerPool {
    store: Arc<dyn JobStore>,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    notifier: Arc<dyn UpdateNotifier>,
    config: WorkerConfig,
}

impl JobWorkerPool {
    pub fn new(
        store: Arc<dyn JobStore>,
        notifier: Arc<dyn UpdateNotifier>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            notifier,
            config,
        }
    }

    /// Register a handler for its job type. A later registration for the
    /// same type replaces the earlier one.
    pub fn register(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(handler.job_type(), handler);
        self
    }

    /// Claim and run at most one job.
    ///
    /// Returns `Ok(false)` when the queue had nothing runnable.
    pub async fn run_once(&self) -> Result<bool, sqlx::Error> {
        let Some(job) = self.store.claim_next().await? else {
            return Ok(false);
        };

        tracing::info!(
            job_id = job.id,
            job_type = %job.job_type,
            attempt = job.attempts,
            "Job claimed",
        );

        let outcome = match self.handlers.get(job.job_type.as_str()) {
            Some(handler) => {
                let progress =
                    ProgressReporter::new(job.id, self.store.clone(), self.notifier.clone());
                handler.run(&job, &progress).await
            }
            None => Err(JobError::Permanent(format!(
                "No handler registered for job type '{}'",
                job.job_type
            ))),
        };

        match outcome {
            Ok(result) => self.record_success(&job, &result).await?,
            Err(err) => self.record_failure(&job, &err).await?,
        }
        Ok(true)
    }

    async fn record_success(&self, job: &Job, result: &serde_json::Value) -> Result<(), sqlx::Error> {
        if self.store.complete(job.id, result).await? {
            tracing::info!(job_id = job.id, "Job completed");
            self.notifier.publish(UpdateEvent::new(EVENT_JOB_COMPLETED).with_payload(
                serde_json::json!({ "job_id": job.id, "job_type": job.job_type }),
            ));
        } else {
            tracing::warn!(job_id = job.id, "Job finished but was no longer active");
        }
        Ok(())
    }

    async fn record_failure(&self, job: &Job, err: &JobError) -> Result<(), sqlx::Error> {
        if err.is_retryable() && job.attempts < job.max_attempts {
            let delay = backoff_delay(self.config.base_backoff, job.attempts);
            if self.store.retry_later(job.id, err.message(), delay).await? {
                tracing::warn!(
                    job_id = job.id,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Job failed, retry scheduled",
                );
            }
            return Ok(());
        }

        if self.store.fail(job.id, err.message()).await? {
            tracing::error!(job_id = job.id, attempt = job.attempts, error = %err, "Job failed");
            self.notifier.publish(UpdateEvent::new(EVENT_JOB_FAILED).with_payload(
                serde_json::json!({
                    "job_id": job.id,
                    "job_type": job.job_type,
                    "error": err.message(),
                }),
            ));
        }
        Ok(())
    }

    /// Spawn `concurrency` worker loops. Each loop exits once `cancel` fires
    /// and it is not in the middle of a job.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        (0..self.config.concurrency)
            .map(|worker| {
                let pool = Arc::clone(&self);
                let cancel = cancel.clone();
                tokio::spawn(async move { pool.worker_loop(worker, cancel).await })
            })
            .collect()
    }

    async fn worker_loop(&self, worker: usize, cancel: CancellationToken) {
        tracing::info!(worker, "Job worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let idle = match self.run_once().await {
                Ok(ran) => !ran,
                Err(e) => {
                    tracing::error!(worker, error = %e, "Job queue unavailable");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }
        tracing::info!(worker, "Job worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 20), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, i16::MAX), MAX_BACKOFF);
    }

    #[test]
    fn backoff_treats_zero_attempts_as_first() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), base);
    }
}
