//! Route definitions for the scene workflow.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workflow;
use crate::state::AppState;

/// Workflow routes mounted at `/workflow`.
///
/// `pollTasks` and `complete` are called by generation workers and guarded
/// by the worker token; the rest require a user.
///
/// ```text
/// GET  /pollTasks?projectId=   -> poll_tasks
/// POST /complete               -> complete_task
/// POST /command                -> handle_command
/// GET  /state/{projectId}      -> get_state
/// POST /scenes/{id}/reuse      -> reuse_asset
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pollTasks", get(workflow::poll_tasks))
        .route("/complete", post(workflow::complete_task))
        .route("/command", post(workflow::handle_command))
        .route("/state/{project_id}", get(workflow::get_state))
        .route("/scenes/{id}/reuse", post(workflow::reuse_asset))
}
