//! Project entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyforge_core::lock::LockState;
use storyforge_core::status::{ProjectStatus, StatusId};
use storyforge_core::types::{DbId, Timestamp};

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub owner_id: DbId,
    pub name: String,
    pub status_id: StatusId,
    pub lock_session_id: Option<String>,
    pub lock_expires_at: Option<Timestamp>,
    pub channel_id: Option<String>,
    pub voice_name: Option<String>,
    pub tts_provider: Option<String>,
    pub video_model: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    /// Unknown status ids (not possible under the FK) read as draft.
    pub fn status(&self) -> ProjectStatus {
        ProjectStatus::from_id(self.status_id).unwrap_or(ProjectStatus::Draft)
    }

    pub fn lock_state(&self) -> LockState<'_> {
        LockState::new(self.lock_session_id.as_deref(), self.lock_expires_at)
    }
}

/// DTO for creating a project.
#[derive(Debug, Default, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub channel_id: Option<String>,
    pub voice_name: Option<String>,
    pub tts_provider: Option<String>,
    pub video_model: Option<String>,
}
