//! Shared query parameter types for API handlers.

use serde::Deserialize;
use storyforge_core::types::DbId;

/// `?projectId=` as sent by generation workers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectIdParams {
    pub project_id: DbId,
}
