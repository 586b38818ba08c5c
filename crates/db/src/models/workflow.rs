//! Transient workflow views: dispatched tasks, completion outcomes, and the
//! project state snapshot.

use serde::Serialize;
use storyforge_core::dispatch::generation_message;
use storyforge_core::scene_state::{MediaKind, ReportDecision, SceneKinds};
use storyforge_core::status::ProjectStatus;
use storyforge_core::types::{DbId, Timestamp};

use super::project::Project;
use super::scene::{Scene, SceneView};

/// A claimed unit of work handed to a worker. Never persisted.
///
/// Serialized in camelCase, the casing of the worker protocol.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub project_id: DbId,
    pub scene_id: DbId,
    pub scene_number: i32,
    pub kind: MediaKind,
    pub payload: serde_json::Value,
}

/// Result of applying a worker report.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub project: Project,
    pub scene: Scene,
    pub decision: ReportDecision,
    /// Set when the report moved the project to a new status.
    pub project_status_changed: Option<ProjectStatus>,
}

/// Full workflow state of a project.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStateView {
    pub project_id: DbId,
    pub status: ProjectStatus,
    pub locked: bool,
    pub lock_session_id: Option<String>,
    pub lock_expires_at: Option<Timestamp>,
    pub message: String,
    pub scenes: Vec<SceneView>,
}

impl WorkflowStateView {
    pub fn build(project: &Project, scenes: &[Scene], now: Timestamp) -> Self {
        let kinds: Vec<SceneKinds> = scenes.iter().map(Scene::kinds).collect();
        let snapshots: Vec<_> = scenes
            .iter()
            .zip(&kinds)
            .map(|(scene, kinds)| scene.snapshot(kinds))
            .collect();
        let holder = project.lock_state().holder(now);

        Self {
            project_id: project.id,
            status: project.status(),
            locked: holder.is_some(),
            lock_session_id: holder.map(str::to_string),
            lock_expires_at: holder.and(project.lock_expires_at),
            message: generation_message(project.status(), &snapshots),
            scenes: scenes.iter().map(SceneView::from).collect(),
        }
    }
}
