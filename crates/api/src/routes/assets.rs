//! Route definitions for the asset reuse catalog.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::assets;
use crate::state::AppState;

/// Asset routes mounted at `/assets`.
///
/// ```text
/// POST /search                 -> search_assets
/// POST /{id}/track-reuse       -> track_reuse
/// GET  /catalog                -> list_catalog
/// POST /catalog                -> catalog_existing (admin)
/// GET  /catalog/stats          -> catalog_stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", post(assets::search_assets))
        .route("/{id}/track-reuse", post(assets::track_reuse))
        .route(
            "/catalog",
            get(assets::list_catalog).post(assets::catalog_existing),
        )
        .route("/catalog/stats", get(assets::catalog_stats))
}
