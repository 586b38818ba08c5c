//! Catalog search: indexed assets first, completed scenes as fallback.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use storyforge_core::catalog::{
    needs_hybrid_fallback, rank, similarity, validate_min_similarity, AssetType, Scored,
    DEFAULT_MIN_SIMILARITY,
};
use storyforge_core::error::CoreError;
use storyforge_core::types::{DbId, Timestamp};
use storyforge_db::models::asset::{CatalogAsset, SceneAssetCandidate};
use storyforge_db::repositories::AssetRepo;

use crate::error::AppResult;

/// Body of `POST /api/v1/assets/search`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub description: String,
    pub asset_type: AssetType,
    pub channel_id: Option<String>,
    #[serde(default)]
    pub exclude_recently_used: bool,
    pub min_similarity: Option<f64>,
}

/// Where a match came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Catalog,
    Scene,
}

/// One search hit. Scene hits carry no catalog `id`.
#[derive(Debug, Clone, Serialize)]
pub struct AssetMatch {
    pub id: Option<DbId>,
    pub source: MatchSource,
    pub asset_type: AssetType,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub duration_seconds: Option<f64>,
    pub reuse_count: i32,
    pub last_used_at: Option<Timestamp>,
    pub source_scene_id: Option<DbId>,
    pub source_project_id: Option<DbId>,
}

impl AssetMatch {
    fn from_catalog(asset: CatalogAsset, asset_type: AssetType) -> Self {
        Self {
            id: Some(asset.id),
            source: MatchSource::Catalog,
            asset_type,
            url: asset.url,
            description: asset.description,
            tags: asset.tags,
            category: asset.category,
            duration_seconds: asset.duration_seconds,
            reuse_count: asset.reuse_count,
            last_used_at: asset.last_used_at,
            source_scene_id: asset.source_scene_id,
            source_project_id: asset.source_project_id,
        }
    }

    fn from_scene(candidate: SceneAssetCandidate, asset_type: AssetType) -> Self {
        Self {
            id: None,
            source: MatchSource::Scene,
            asset_type,
            url: candidate.url,
            description: candidate.description.unwrap_or_default(),
            tags: Vec::new(),
            category: None,
            duration_seconds: candidate.duration_seconds,
            reuse_count: 0,
            last_used_at: None,
            source_scene_id: Some(candidate.scene_id),
            source_project_id: Some(candidate.project_id),
        }
    }
}

fn score(query: &str, item: AssetMatch) -> Scored<AssetMatch> {
    Scored {
        similarity: similarity(query, &item.description, &item.tags),
        reuse_count: item.reuse_count,
        last_used_at: item.last_used_at,
        item,
    }
}

/// Find assets compatible with a description, best first.
///
/// When fewer than three indexed assets qualify, completed scene outputs
/// not yet in the catalog are scored too and merged into the ranking.
pub async fn find_compatible_assets(
    pool: &PgPool,
    request: &SearchRequest,
    recency_days: i32,
) -> AppResult<Vec<Scored<AssetMatch>>> {
    let query = request.description.trim();
    if query.is_empty() {
        return Err(CoreError::Validation("description must not be empty".into()).into());
    }
    let min_similarity = request.min_similarity.unwrap_or(DEFAULT_MIN_SIMILARITY);
    validate_min_similarity(min_similarity)?;

    let exclude_channel = request
        .channel_id
        .as_deref()
        .filter(|_| request.exclude_recently_used);

    let indexed: Vec<Scored<AssetMatch>> =
        AssetRepo::find_candidates(pool, request.asset_type, exclude_channel, recency_days)
            .await?
            .into_iter()
            .map(|asset| score(query, AssetMatch::from_catalog(asset, request.asset_type)))
            .collect();

    let ranked = rank(indexed, min_similarity);
    if !needs_hybrid_fallback(ranked.len()) {
        return Ok(ranked);
    }

    let scenes =
        match AssetRepo::find_scene_candidates(pool, request.asset_type.media_kind()).await {
            Ok(scenes) => scenes,
            Err(e) => {
                tracing::warn!(error = %e, "Hybrid scene search failed, using catalog results");
                return Ok(ranked);
            }
        };

    let mut merged = ranked;
    let scene_hits = scenes
        .into_iter()
        .filter(|candidate| !merged.iter().any(|m| m.item.url == candidate.url))
        .map(|candidate| score(query, AssetMatch::from_scene(candidate, request.asset_type)))
        .collect::<Vec<_>>();
    tracing::debug!(
        indexed = merged.len(),
        scene_candidates = scene_hits.len(),
        "Hybrid catalog search",
    );
    merged.extend(scene_hits);

    Ok(rank(merged, min_similarity))
}
