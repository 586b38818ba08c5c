//! Response bodies shared across handler modules.

use serde::Serialize;
use storyforge_core::catalog::Scored;
use storyforge_core::status::{AssetStatus, ProjectStatus};
use storyforge_core::types::DbId;
use storyforge_db::models::asset::CatalogAsset;
use storyforge_db::models::scene::SceneView;

use crate::engine::catalog::AssetMatch;

/// `202 Accepted` body for queued background jobs.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: DbId,
}

/// Result of applying a worker report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskResponse {
    pub accepted: bool,
    /// Status the reported kind ended up in.
    pub status: AssetStatus,
    /// The failure was requeued for another attempt.
    pub retried: bool,
    pub project_status: ProjectStatus,
    pub scene: SceneView,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub matches: Vec<Scored<AssetMatch>>,
    pub total: usize,
}

/// `tracked` is false when the id is not a cataloged asset.
#[derive(Debug, Serialize)]
pub struct TrackReuseResponse {
    pub tracked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<CatalogAsset>,
}
