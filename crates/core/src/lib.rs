//! Storyforge domain logic.
//!
//! Pure, database-free building blocks shared by the repository layer,
//! the job worker, and the HTTP API:
//!
//! - [`status`]: status enums backed by SMALLINT lookup tables.
//! - [`lock`]: project lock acquire/release decisions.
//! - [`scene_state`]: per-kind scene state machine and aggregate status.
//! - [`dispatch`]: task selection and workflow command planning.
//! - [`catalog`]: asset similarity scoring and ranking.
//! - [`roles`]: role names used for authorization.

pub mod catalog;
pub mod dispatch;
pub mod error;
pub mod job_events;
pub mod lock;
pub mod roles;
pub mod scene_state;
pub mod status;
pub mod types;
