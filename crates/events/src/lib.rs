//! Storyforge update notifier.
//!
//! Workflow and job state changes are pushed to connected clients through
//! a narrow publish interface:
//!
//! - [`UpdateNotifier`]: the `publish` seam used by the engine and worker.
//! - [`EventBus`]: in-process fan-out backed by `tokio::sync::broadcast`.
//! - [`UpdateEvent`]: the event envelope, optionally scoped to a project.
//!
//! Delivery is best-effort and at-most-once to listeners connected at
//! publish time.

pub mod bus;
pub mod notifier;

pub use bus::{EventBus, UpdateEvent};
pub use notifier::{NullNotifier, UpdateNotifier};
