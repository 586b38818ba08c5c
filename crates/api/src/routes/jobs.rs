//! Route definitions for background jobs.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Job routes mounted at `/jobs`.
///
/// ```text
/// POST /schedule               -> submit_schedule
/// GET  /{id}                   -> get_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedule", post(jobs::submit_schedule))
        .route("/{id}", get(jobs::get_job))
}
