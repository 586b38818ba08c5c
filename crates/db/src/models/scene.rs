//! Scene entity model, per-kind column mapping, and the scene view.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyforge_core::dispatch::{SceneSnapshot, TaskContext};
use storyforge_core::scene_state::{
    derive_scene_status, KindState, MediaKind, MediaType, SceneKinds, SceneStatus,
};
use storyforge_core::status::{AssetStatus, StatusId};
use storyforge_core::types::{DbId, Timestamp};

use super::project::Project;

/// A row from the `scenes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Scene {
    pub id: DbId,
    pub project_id: DbId,
    pub scene_number: i32,
    pub media_type: String,
    pub visual_description: Option<String>,
    pub narration: Option<String>,
    pub sfx_prompt: Option<String>,
    pub duration_seconds: Option<f64>,
    pub image_status_id: StatusId,
    pub image_url: Option<String>,
    pub image_attempts: i16,
    pub audio_status_id: StatusId,
    pub audio_url: Option<String>,
    pub audio_attempts: i16,
    pub video_status_id: StatusId,
    pub video_url: Option<String>,
    pub video_attempts: i16,
    pub sfx_status_id: StatusId,
    pub sfx_url: Option<String>,
    pub sfx_attempts: i16,
    pub error_message: Option<String>,
    pub skipped: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

fn kind_state(status_id: StatusId, url: &Option<String>, attempts: i16) -> KindState {
    KindState {
        status: AssetStatus::from_id(status_id).unwrap_or(AssetStatus::Draft),
        url: url.clone(),
        attempts,
    }
}

impl Scene {
    pub fn media_type(&self) -> MediaType {
        MediaType::parse_or_default(&self.media_type)
    }

    pub fn has_sfx_prompt(&self) -> bool {
        self.sfx_prompt
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }

    pub fn kinds(&self) -> SceneKinds {
        SceneKinds {
            image: kind_state(self.image_status_id, &self.image_url, self.image_attempts),
            audio: kind_state(self.audio_status_id, &self.audio_url, self.audio_attempts),
            video: kind_state(self.video_status_id, &self.video_url, self.video_attempts),
            sfx: kind_state(self.sfx_status_id, &self.sfx_url, self.sfx_attempts),
        }
    }

    pub fn snapshot<'a>(&self, kinds: &'a SceneKinds) -> SceneSnapshot<'a> {
        SceneSnapshot {
            scene_id: self.id,
            scene_number: self.scene_number,
            media_type: self.media_type(),
            has_sfx_prompt: self.has_sfx_prompt(),
            skipped: self.skipped,
            kinds,
        }
    }

    /// Text describing the asset a kind produces.
    pub fn description_for(&self, kind: MediaKind) -> Option<&str> {
        let text = match kind {
            MediaKind::Image | MediaKind::Video => self.visual_description.as_deref(),
            MediaKind::Audio => self.narration.as_deref(),
            MediaKind::Sfx => self.sfx_prompt.as_deref(),
        };
        text.filter(|t| !t.trim().is_empty())
    }

    /// Fields a worker needs, with generation settings taken from the project.
    pub fn task_context<'a>(&'a self, project: &'a Project) -> TaskContext<'a> {
        TaskContext {
            visual_description: self.visual_description.as_deref(),
            narration: self.narration.as_deref(),
            sfx_prompt: self.sfx_prompt.as_deref(),
            image_url: self.image_url.as_deref(),
            duration_seconds: self.duration_seconds,
            voice_name: project.voice_name.as_deref(),
            tts_provider: project.tts_provider.as_deref(),
            video_model: project.video_model.as_deref(),
        }
    }
}

/// Column names holding one kind's state.
#[derive(Debug, Clone, Copy)]
pub struct KindColumns {
    pub status: &'static str,
    pub url: &'static str,
    pub attempts: &'static str,
    /// Text describing the kind's asset, used for catalog entries.
    pub description: &'static str,
}

/// Explicit mapping from kind to its scene columns.
pub fn kind_columns(kind: MediaKind) -> KindColumns {
    match kind {
        MediaKind::Image => KindColumns {
            status: "image_status_id",
            url: "image_url",
            attempts: "image_attempts",
            description: "visual_description",
        },
        MediaKind::Audio => KindColumns {
            status: "audio_status_id",
            url: "audio_url",
            attempts: "audio_attempts",
            description: "narration",
        },
        MediaKind::Video => KindColumns {
            status: "video_status_id",
            url: "video_url",
            attempts: "video_attempts",
            description: "visual_description",
        },
        MediaKind::Sfx => KindColumns {
            status: "sfx_status_id",
            url: "sfx_url",
            attempts: "sfx_attempts",
            description: "sfx_prompt",
        },
    }
}

/// DTO for creating a scene. `scene_number` defaults to the next free number.
#[derive(Debug, Default, Deserialize)]
pub struct CreateScene {
    pub scene_number: Option<i32>,
    pub media_type: Option<String>,
    pub visual_description: Option<String>,
    pub narration: Option<String>,
    pub sfx_prompt: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// A scene as returned by the workflow API, with its derived status.
#[derive(Debug, Clone, Serialize)]
pub struct SceneView {
    pub id: DbId,
    pub scene_number: i32,
    pub media_type: MediaType,
    pub status: SceneStatus,
    pub skipped: bool,
    pub visual_description: Option<String>,
    pub narration: Option<String>,
    pub sfx_prompt: Option<String>,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
    pub image: KindState,
    pub audio: KindState,
    pub video: KindState,
    pub sfx: KindState,
}

impl From<&Scene> for SceneView {
    fn from(scene: &Scene) -> Self {
        let kinds = scene.kinds();
        let media_type = scene.media_type();
        Self {
            id: scene.id,
            scene_number: scene.scene_number,
            media_type,
            status: derive_scene_status(media_type, &kinds),
            skipped: scene.skipped,
            visual_description: scene.visual_description.clone(),
            narration: scene.narration.clone(),
            sfx_prompt: scene.sfx_prompt.clone(),
            duration_seconds: scene.duration_seconds,
            error_message: scene.error_message.clone(),
            image: kinds.image,
            audio: kinds.audio,
            video: kinds.video,
            sfx: kinds.sfx,
        }
    }
}
