//! Background job execution.
//!
//! A fixed-size pool of workers claims jobs from a [`JobStore`]
//! (PostgreSQL in production), runs the registered [`JobHandler`] for the
//! job type, and records the outcome. Transient failures are retried with
//! exponential backoff; permanent failures are final. A maintenance loop
//! requeues jobs whose worker disappeared and sweeps expired terminal jobs.

pub mod config;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod maintenance;
pub mod pool;
pub mod store;

pub use config::WorkerConfig;
pub use error::JobError;
pub use handler::{JobHandler, ProgressReporter};
pub use pool::JobWorkerPool;
pub use store::{JobStore, PgJobStore};
