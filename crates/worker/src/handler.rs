use std::sync::Arc;

use async_trait::async_trait;
use storyforge_core::job_events::EVENT_JOB_PROGRESS;
use storyforge_core::types::DbId;
use storyforge_db::models::job::Job;
use storyforge_events::{UpdateEvent, UpdateNotifier};

use crate::error::JobError;
use crate::store::JobStore;

/// Executes jobs of one type.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The `job_type` value this handler accepts.
    fn job_type(&self) -> &'static str;

    /// Run the job and return its result payload.
    async fn run(
        &self,
        job: &Job,
        progress: &ProgressReporter,
    ) -> Result<serde_json::Value, JobError>;
}

/// Handle given to a running job for progress updates.
pub struct ProgressReporter {
    job_id: DbId,
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn UpdateNotifier>,
}

impl ProgressReporter {
    pub fn new(job_id: DbId, store: Arc<dyn JobStore>, notifier: Arc<dyn UpdateNotifier>) -> Self {
        Self {
            job_id,
            store,
            notifier,
        }
    }

    /// Record progress (clamped to 0-100). Failures are logged, not raised:
    /// progress is advisory.
    pub async fn report(&self, percent: i16) {
        let percent = percent.clamp(0, 100);
        match self.store.update_progress(self.job_id, percent).await {
            Ok(true) => {
                self.notifier.publish(UpdateEvent::new(EVENT_JOB_PROGRESS).with_payload(
                    serde_json::json!({ "job_id": self.job_id, "progress": percent }),
                ));
            }
            Ok(false) => {
                tracing::debug!(job_id = self.job_id, "Progress ignored: job no longer active");
            }
            Err(e) => {
                tracing::warn!(job_id = self.job_id, error = %e, "Failed to record job progress");
            }
        }
    }
}
