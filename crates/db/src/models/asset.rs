//! Asset catalog models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyforge_core::catalog::AssetType;
use storyforge_core::types::{DbId, Timestamp};

/// A row from the `asset_index` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CatalogAsset {
    pub id: DbId,
    pub asset_type: String,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub duration_seconds: Option<f64>,
    pub reuse_count: i32,
    pub last_used_at: Option<Timestamp>,
    pub last_used_in_channel: Option<String>,
    pub quality_score: f64,
    pub source_scene_id: Option<DbId>,
    pub source_project_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CatalogAsset {
    pub fn asset_type(&self) -> Option<AssetType> {
        AssetType::parse(&self.asset_type)
    }
}

/// DTO for registering a generated asset.
#[derive(Debug, Clone)]
pub struct NewCatalogAsset {
    pub asset_type: AssetType,
    pub url: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub duration_seconds: Option<f64>,
    pub source_scene_id: Option<DbId>,
    pub source_project_id: Option<DbId>,
}

/// Query parameters for `GET /api/v1/assets/catalog`.
#[derive(Debug, Default, Deserialize)]
pub struct AssetListQuery {
    pub asset_type: Option<String>,
    pub category: Option<String>,
    /// Defaults to 20, capped at 100.
    pub limit: Option<i64>,
    /// Defaults to 0.
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetPage {
    pub assets: Vec<CatalogAsset>,
    pub total: i64,
}

/// A completed scene asset scored by the hybrid search. Carries no
/// catalog id.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SceneAssetCandidate {
    pub scene_id: DbId,
    pub project_id: DbId,
    pub url: String,
    pub description: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// Per-type counts of newly indexed entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub images: i64,
    pub audios: i64,
    pub videos: i64,
    pub sfx: i64,
    pub total: i64,
}

impl CatalogSummary {
    pub fn record(&mut self, asset_type: AssetType) {
        match asset_type {
            AssetType::Image => self.images += 1,
            AssetType::Audio => self.audios += 1,
            AssetType::Video => self.videos += 1,
            AssetType::Sfx => self.sfx += 1,
        }
        self.total += 1;
    }
}
