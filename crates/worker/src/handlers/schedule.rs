//! `schedule_generation` jobs: weekly content schedules produced by the
//! external schedule generation service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storyforge_db::models::job::Job;

use crate::config::WorkerConfig;
use crate::error::JobError;
use crate::handler::{JobHandler, ProgressReporter};

pub const JOB_TYPE: &str = "schedule_generation";

/// Parameters stored on a `schedule_generation` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleParams {
    pub persona_id: String,
    pub message: String,
    #[serde(default)]
    pub channel_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

impl ScheduleParams {
    /// Reject parameters the service would refuse anyway.
    pub fn validate(&self) -> Result<(), String> {
        if self.persona_id.trim().is_empty() {
            return Err("persona_id must not be empty".into());
        }
        if self.message.trim().is_empty() {
            return Err("message must not be empty".into());
        }
        Ok(())
    }
}

/// Calls `POST {SCHEDULE_SERVICE_URL}/schedules/generate`.
pub struct ScheduleGenerationHandler {
    client: reqwest::Client,
    endpoint: String,
}

impl ScheduleGenerationHandler {
    pub fn new(config: &WorkerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.schedule_timeout)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self::with_client(client, &config.schedule_service_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/schedules/generate", base_url.trim_end_matches('/')),
        }
    }
}

/// Connection failures and timeouts may clear up; anything else the
/// client reports (bad URL, body encoding) will not.
fn classify_request_error(err: reqwest::Error) -> JobError {
    if err.is_timeout() || err.is_connect() {
        JobError::Transient(format!("Schedule service unreachable: {err}"))
    } else {
        JobError::Permanent(format!("Schedule service request failed: {err}"))
    }
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> JobError {
    let message = format!("Schedule service returned HTTP {}: {body}", status.as_u16());
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        JobError::Transient(message)
    } else {
        JobError::Permanent(message)
    }
}

#[async_trait]
impl JobHandler for ScheduleGenerationHandler {
    fn job_type(&self) -> &'static str {
        JOB_TYPE
    }

    async fn run(
        &self,
        job: &Job,
        progress: &ProgressReporter,
    ) -> Result<serde_json::Value, JobError> {
        let params: ScheduleParams = serde_json::from_value(job.parameters.clone())
            .map_err(|e| JobError::Permanent(format!("Invalid job parameters: {e}")))?;
        params.validate().map_err(JobError::Permanent)?;

        progress.report(10).await;

        let body = serde_json::json!({
            "user_id": job.submitted_by,
            "persona_id": params.persona_id,
            "message": params.message,
            "channel_context": params.channel_context,
            "language": params.language,
            "voice": params.voice,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(classify_status(status, &text));
        }

        progress.report(90).await;

        let result = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| JobError::Permanent(format!("Invalid schedule service response: {e}")))?;

        tracing::debug!(job_id = job.id, persona_id = %params.persona_id, "Schedule generated");
        Ok(result)
    }
}
