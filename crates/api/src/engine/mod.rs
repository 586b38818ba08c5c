//! Orchestration on top of the repositories.
//!
//! Handlers stay thin: they authenticate, parse, and call into the engine,
//! which runs the transactional repository operation and then publishes the
//! resulting state change through the update notifier.

pub mod catalog;
pub mod workflow;
