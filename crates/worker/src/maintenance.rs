//! Lease recovery and retention sweep for the job queue.
//!
//! Runs once at startup so jobs orphaned by a crashed process are requeued
//! before workers begin claiming, then on a fixed interval.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::store::JobStore;

/// One pass: requeue (or fail) stale active jobs, then delete expired ones.
pub async fn sweep(store: &dyn JobStore, config: &WorkerConfig) -> Result<(), sqlx::Error> {
    let (requeued, failed) = store.requeue_stale(config.lease).await?;
    if requeued > 0 || failed > 0 {
        tracing::warn!(requeued, failed, "Recovered stale jobs");
    }

    let deleted = store.delete_expired(config.retention_hours).await?;
    if deleted > 0 {
        tracing::info!(deleted, retention_hours = config.retention_hours, "Job retention sweep");
    }
    Ok(())
}

/// Run the sweep loop until cancelled.
pub async fn run(store: Arc<dyn JobStore>, config: WorkerConfig, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(config.maintenance_interval);

    tracing::info!(
        interval_secs = config.maintenance_interval.as_secs(),
        lease_secs = config.lease.as_secs(),
        "Job maintenance started",
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job maintenance stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = sweep(store.as_ref(), &config).await {
                    tracing::error!(error = %e, "Job maintenance sweep failed");
                }
            }
        }
    }
}
