use crate::types::DbId;

/// Domain-level error shared by every crate in the workspace.
///
/// The API layer maps each variant onto an HTTP status; see
/// `storyforge_api::error::AppError`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// The project lock is held by a different, still-valid session.
    #[error("Lock conflict: {0}")]
    LockConflict(String),

    /// A worker report or command is inconsistent with the current state.
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A failure reported by an out-of-process worker, surfaced verbatim.
    #[error("Worker reported failure: {0}")]
    WorkerReportedFailure(String),

    /// The durable job queue backend could not be reached.
    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
