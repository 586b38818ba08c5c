pub mod assets;
pub mod events;
pub mod health;
pub mod jobs;
pub mod projects;
pub mod workflow;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /projects/{id}/lock                              acquire / extend lock
/// /projects/{id}/unlock                            release lock
///
/// /workflow/pollTasks?projectId=                   next task (worker)
/// /workflow/complete                               report task result (worker)
/// /workflow/command                                user command
/// /workflow/state/{projectId}                      workflow snapshot
/// /workflow/scenes/{id}/reuse                      reuse an asset on a scene
///
/// /jobs/schedule                                   queue schedule generation
/// /jobs/{id}                                       job status
///
/// /assets/search                                   find reusable assets
/// /assets/{id}/track-reuse                         record a reuse
/// /assets/catalog                                  list (GET), backfill (POST, admin)
/// /assets/catalog/stats                            reuse statistics
///
/// /events                                          SSE, all projects (admin)
/// /events/{projectId}                              SSE, one project
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/projects", projects::router())
        .nest("/workflow", workflow::router())
        .nest("/jobs", jobs::router())
        .nest("/assets", assets::router())
        .nest("/events", events::router())
}
