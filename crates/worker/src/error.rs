/// Failure of a job handler, classified for retry.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// May succeed on another attempt (network errors, upstream 5xx).
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Will fail the same way again (bad parameters, upstream 4xx).
    #[error("Permanent failure: {0}")]
    Permanent(String),
}

impl JobError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::Transient(_))
    }

    /// Message stored on the job row.
    pub fn message(&self) -> &str {
        match self {
            JobError::Transient(m) | JobError::Permanent(m) => m,
        }
    }
}
