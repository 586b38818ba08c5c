//! Route definitions for project locking.

use axum::routing::post;
use axum::Router;

use crate::handlers::projects;
use crate::state::AppState;

/// Project routes mounted at `/projects`.
///
/// ```text
/// POST /{id}/lock              -> acquire_lock
/// POST /{id}/unlock            -> release_lock
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/lock", post(projects::acquire_lock))
        .route("/{id}/unlock", post(projects::release_lock))
}
