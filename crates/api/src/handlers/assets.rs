//! Handlers for the asset reuse catalog.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use storyforge_core::catalog::reuse_stats;
use storyforge_core::types::DbId;
use storyforge_db::models::asset::AssetListQuery;
use storyforge_db::repositories::AssetRepo;

use crate::engine::catalog::{find_compatible_assets, SearchRequest};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::{SearchResponse, TrackReuseResponse};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackReuseRequest {
    pub channel_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Search & reuse
// ---------------------------------------------------------------------------

/// POST /api/v1/assets/search
pub async fn search_assets(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SearchRequest>,
) -> AppResult<impl IntoResponse> {
    let matches =
        find_compatible_assets(&state.pool, &input, state.config.catalog_recency_days).await?;

    tracing::debug!(
        asset_type = %input.asset_type,
        matches = matches.len(),
        "Catalog search",
    );

    Ok(Json(SearchResponse {
        total: matches.len(),
        matches,
    }))
}

/// POST /api/v1/assets/{id}/track-reuse
///
/// Unknown ids are not an error: callers may pass scene-local ids that were
/// never cataloged, and get `tracked: false`. The body is optional.
pub async fn track_reuse(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(asset_id): Path<DbId>,
    body: Option<Json<TrackReuseRequest>>,
) -> AppResult<impl IntoResponse> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let asset = AssetRepo::track_reuse(&state.pool, asset_id, input.channel_id.as_deref()).await?;

    match &asset {
        Some(a) => tracing::info!(asset_id, reuse_count = a.reuse_count, "Asset reuse tracked"),
        None => tracing::debug!(asset_id, "Reuse of uncataloged asset ignored"),
    }

    Ok(Json(TrackReuseResponse {
        tracked: asset.is_some(),
        asset,
    }))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// GET /api/v1/assets/catalog
pub async fn list_catalog(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<AssetListQuery>,
) -> AppResult<impl IntoResponse> {
    let page = AssetRepo::list(&state.pool, &params).await?;
    Ok(Json(page))
}

/// POST /api/v1/assets/catalog
///
/// Index every completed scene output not yet in the catalog. Safe to
/// repeat: already indexed URLs are skipped.
pub async fn catalog_existing(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let summary = AssetRepo::catalog_existing(&state.pool).await?;
    tracing::info!(
        user_id = admin.user_id,
        images = summary.images,
        audios = summary.audios,
        videos = summary.videos,
        sfx = summary.sfx,
        "Existing assets cataloged",
    );
    Ok(Json(summary))
}

/// GET /api/v1/assets/catalog/stats
pub async fn catalog_stats(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let usage = AssetRepo::usage_by_type(&state.pool).await?;
    Ok(Json(reuse_stats(&usage)))
}
