//! Route definitions for server-sent events.

use axum::routing::get;
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;

/// Event stream routes mounted at `/events`.
///
/// ```text
/// GET  /                       -> all_events (admin)
/// GET  /{project_id}           -> project_events
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(events::all_events))
        .route("/{project_id}", get(events::project_events))
}
