//! Event type constants published on the update notifier.
//!
//! Used by the workflow engine and job worker when broadcasting state
//! changes; SSE clients receive them as the `type` field of each frame.

/// First frame of every stream.
pub const EVENT_CONNECTED: &str = "connected";

/// Full workflow snapshot sent right after `connected`.
pub const EVENT_INIT: &str = "init";

/// A project lock was acquired or released.
pub const EVENT_PROJECT_LOCK: &str = "project.lock";

/// Project status or scene states changed after a command.
pub const EVENT_WORKFLOW_STATE: &str = "workflow.state";

/// A task was handed to a worker.
pub const EVENT_TASK_CLAIMED: &str = "task.claimed";

/// A worker report was applied.
pub const EVENT_TASK_COMPLETED: &str = "task.completed";

/// A worker failure was recorded (requeued or final).
pub const EVENT_TASK_FAILED: &str = "task.failed";

/// Background job progress update.
pub const EVENT_JOB_PROGRESS: &str = "job.progress";

/// Background job completed successfully.
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// Background job failed permanently.
pub const EVENT_JOB_FAILED: &str = "job.failed";
