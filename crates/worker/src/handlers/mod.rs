//! Built-in job handlers.

pub mod schedule;

pub use schedule::ScheduleGenerationHandler;
