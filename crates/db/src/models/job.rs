//! Background job models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyforge_core::status::{JobStatus, StatusId};
use storyforge_core::types::{DbId, Timestamp};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub job_type: String,
    pub status_id: StatusId,
    pub submitted_by: DbId,
    pub parameters: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub progress_percent: i16,
    pub attempts: i16,
    pub max_attempts: i16,
    pub run_after: Timestamp,
    pub submitted_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    pub fn status(&self) -> JobStatus {
        JobStatus::from_id(self.status_id).unwrap_or(JobStatus::Queued)
    }
}

/// DTO for enqueuing a job.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJob {
    pub job_type: String,
    pub parameters: serde_json::Value,
    /// Defaults to the table default (3).
    pub max_attempts: Option<i16>,
}

/// Job as reported to pollers. `result` is only present once completed and
/// `error` only once failed.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: DbId,
    pub job_type: String,
    pub status: JobStatus,
    pub progress: i16,
    pub attempts: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        let status = job.status();
        Self {
            id: job.id,
            job_type: job.job_type.clone(),
            status,
            progress: job.progress_percent,
            attempts: job.attempts,
            result: match status {
                JobStatus::Completed => job.result.clone(),
                _ => None,
            },
            error: match status {
                JobStatus::Failed => job.error_message.clone(),
                _ => None,
            },
            submitted_at: job.submitted_at,
            completed_at: job.completed_at,
        }
    }
}
