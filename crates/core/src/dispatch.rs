//! Task selection and workflow command planning.
//!
//! Tasks are never stored: the next unit of work is computed from scene
//! state on every poll, and claimed by a compare-and-swap on the chosen
//! kind's status (see `storyforge_db::repositories::WorkflowRepo`).
//! Commands are planned here against a snapshot and applied by the
//! repository in one transaction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::scene_state::{KindUpdate, MediaKind, MediaType, SceneKinds};
use crate::status::{AssetStatus, ProjectStatus};
use crate::types::DbId;

/// Error stored on scene kinds stopped by a cancel command.
pub const CANCELLED_MESSAGE: &str = "Cancelled by user";

// ---------------------------------------------------------------------------
// Scene snapshots
// ---------------------------------------------------------------------------

/// Read-only view of a scene used for planning.
#[derive(Debug, Clone, Copy)]
pub struct SceneSnapshot<'a> {
    pub scene_id: DbId,
    pub scene_number: i32,
    pub media_type: MediaType,
    pub has_sfx_prompt: bool,
    pub skipped: bool,
    pub kinds: &'a SceneKinds,
}

impl SceneSnapshot<'_> {
    /// Kinds this scene generates: its required kinds plus sound effects
    /// when a prompt is present, in dispatch order.
    pub fn applicable_kinds(&self) -> Vec<MediaKind> {
        MediaKind::ALL
            .into_iter()
            .filter(|k| self.is_applicable(*k))
            .collect()
    }

    pub fn is_applicable(&self, kind: MediaKind) -> bool {
        self.media_type.required_kinds().contains(&kind)
            || (kind == MediaKind::Sfx && self.has_sfx_prompt)
    }
}

// ---------------------------------------------------------------------------
// Task selection
// ---------------------------------------------------------------------------

/// The unit of work chosen for a poll, before it is claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCandidate {
    pub scene_id: DbId,
    pub kind: MediaKind,
    /// Status the claim must still observe (compare-and-swap guard).
    pub expected: AssetStatus,
}

/// Pick the next task for a project.
///
/// Scenes are visited by ascending `scene_number`. Within a scene, the first
/// `queued` kind wins over the first `pending` one. Queued audio and sfx are
/// dispatchable unless the project is paused or failed. Image and video, and
/// any pending kind, only while it is generating, since their results are
/// rejected otherwise.
pub fn select_next(
    project_status: ProjectStatus,
    scenes: &[SceneSnapshot<'_>],
) -> Option<TaskCandidate> {
    if matches!(project_status, ProjectStatus::Paused | ProjectStatus::Failed) {
        return None;
    }
    let generating = project_status == ProjectStatus::Generating;

    let mut ordered: Vec<&SceneSnapshot<'_>> = scenes.iter().collect();
    ordered.sort_by_key(|s| s.scene_number);

    ordered.into_iter().find_map(|scene| {
        let find = |wanted: AssetStatus| {
            MediaKind::ALL
                .into_iter()
                .filter(|k| generating || !k.is_primary())
                .find(|k| scene.kinds.status(*k) == wanted)
                .map(|kind| TaskCandidate {
                    scene_id: scene.scene_id,
                    kind,
                    expected: wanted,
                })
        };
        find(AssetStatus::Queued).or_else(|| {
            if generating {
                find(AssetStatus::Pending)
            } else {
                None
            }
        })
    })
}

// ---------------------------------------------------------------------------
// Task payload
// ---------------------------------------------------------------------------

/// Scene and project fields a worker needs to generate one kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskContext<'a> {
    pub visual_description: Option<&'a str>,
    pub narration: Option<&'a str>,
    pub sfx_prompt: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub duration_seconds: Option<f64>,
    pub voice_name: Option<&'a str>,
    pub tts_provider: Option<&'a str>,
    pub video_model: Option<&'a str>,
}

/// Build the opaque payload handed to a worker for `kind`.
pub fn build_payload(kind: MediaKind, ctx: &TaskContext<'_>) -> serde_json::Value {
    match kind {
        MediaKind::Image => serde_json::json!({
            "prompt": ctx.visual_description,
        }),
        MediaKind::Audio => serde_json::json!({
            "text": ctx.narration,
            "voice": ctx.voice_name,
            "provider": ctx.tts_provider,
        }),
        MediaKind::Video => serde_json::json!({
            "prompt": ctx.visual_description,
            "image_url": ctx.image_url,
            "model": ctx.video_model,
            "duration_seconds": ctx.duration_seconds,
        }),
        MediaKind::Sfx => serde_json::json!({
            "prompt": ctx.sfx_prompt,
            "duration_seconds": ctx.duration_seconds,
        }),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A workflow command issued by the project owner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WorkflowAction {
    /// Generate every applicable kind of every scene. Completed kinds are
    /// kept unless `force` is set.
    GenerateAll {
        #[serde(default)]
        force: bool,
    },
    /// Generate (or regenerate) one kind of one scene.
    GenerateKind { scene_id: DbId, kind: MediaKind },
    /// Generate one kind across all scenes it applies to.
    GenerateAllKind {
        kind: MediaKind,
        #[serde(default)]
        force: bool,
    },
    /// Regenerate every applicable kind of one scene.
    RegenerateScene { scene_id: DbId },
    Cancel,
    Pause,
    /// Continue a paused project. Kinds stuck in flight are handed out again.
    Resume,
    /// Exclude a scene from generation and from project completion.
    SkipScene { scene_id: DbId },
    /// Renumber scenes in the given order (must list every scene once).
    ReorderScenes { scene_ids: Vec<DbId> },
}

impl WorkflowAction {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowAction::GenerateAll { .. } => "generate_all",
            WorkflowAction::GenerateKind { .. } => "generate_kind",
            WorkflowAction::GenerateAllKind { .. } => "generate_all_kind",
            WorkflowAction::RegenerateScene { .. } => "regenerate_scene",
            WorkflowAction::Cancel => "cancel",
            WorkflowAction::Pause => "pause",
            WorkflowAction::Resume => "resume",
            WorkflowAction::SkipScene { .. } => "skip_scene",
            WorkflowAction::ReorderScenes { .. } => "reorder_scenes",
        }
    }
}

/// How a command changes a scene's stored error message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessageUpdate {
    #[default]
    Keep,
    Clear,
    Set(String),
}

/// All changes a command makes to one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneChange {
    pub scene_id: DbId,
    pub updates: Vec<KindUpdate>,
    pub error_message: MessageUpdate,
    pub skipped: Option<bool>,
}

impl SceneChange {
    fn new(scene_id: DbId) -> Self {
        Self {
            scene_id,
            updates: Vec::new(),
            error_message: MessageUpdate::Keep,
            skipped: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.error_message == MessageUpdate::Keep && self.skipped.is_none()
    }
}

/// Everything a command will persist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandPlan {
    pub project_status: Option<ProjectStatus>,
    pub scene_changes: Vec<SceneChange>,
    /// New scene order; scene numbers are reassigned from 1.
    pub reorder: Option<Vec<DbId>>,
}

/// Validate `action` against current state and compute its changes.
///
/// Nothing is mutated here; illegal commands fail before the repository
/// touches any row.
pub fn plan_command(
    action: &WorkflowAction,
    project_status: ProjectStatus,
    scenes: &[SceneSnapshot<'_>],
) -> Result<CommandPlan, CoreError> {
    match action {
        WorkflowAction::GenerateAll { force } => {
            require_scenes(scenes)?;
            require_not_paused(project_status)?;
            let changes = scenes
                .iter()
                .map(|scene| -> Result<SceneChange, CoreError> {
                    let mut change = SceneChange::new(scene.scene_id);
                    for kind in scene.applicable_kinds() {
                        let status = scene.kinds.status(kind);
                        let keep = !*force
                            && (status == AssetStatus::Completed || status.is_in_flight());
                        if !keep {
                            change
                                .updates
                                .push(KindUpdate::reset(kind, AssetStatus::Pending)?);
                        }
                    }
                    change.error_message = MessageUpdate::Clear;
                    change.skipped = Some(false);
                    Ok(change)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(plan(Some(ProjectStatus::Generating), changes))
        }

        WorkflowAction::GenerateKind { scene_id, kind } => {
            require_not_paused(project_status)?;
            let scene = find_scene(scenes, *scene_id)?;
            if *kind == MediaKind::Sfx && !scene.has_sfx_prompt {
                return Err(CoreError::Validation(
                    "Scene has no sound effect prompt".into(),
                ));
            }
            let mut change = SceneChange::new(scene.scene_id);
            change.updates.push(queue_kind(scene, *kind)?);
            change.error_message = MessageUpdate::Clear;
            change.skipped = Some(false);
            Ok(plan(Some(ProjectStatus::Generating), vec![change]))
        }

        WorkflowAction::GenerateAllKind { kind, force } => {
            require_scenes(scenes)?;
            require_not_paused(project_status)?;
            let mut changes = Vec::new();
            for scene in scenes.iter().filter(|s| s.is_applicable(*kind)) {
                let status = scene.kinds.status(*kind);
                if status.is_in_flight() || (!*force && status == AssetStatus::Completed) {
                    continue;
                }
                let mut change = SceneChange::new(scene.scene_id);
                change.updates.push(KindUpdate::reset(*kind, AssetStatus::Queued)?);
                change.skipped = Some(false);
                changes.push(change);
            }
            if changes.is_empty() {
                return Err(CoreError::Conflict(format!(
                    "No scene needs {kind} generation"
                )));
            }
            Ok(plan(Some(ProjectStatus::Generating), changes))
        }

        WorkflowAction::RegenerateScene { scene_id } => {
            require_not_paused(project_status)?;
            let scene = find_scene(scenes, *scene_id)?;
            let mut change = SceneChange::new(scene.scene_id);
            for kind in scene.applicable_kinds() {
                change.updates.push(queue_kind(scene, kind)?);
            }
            change.error_message = MessageUpdate::Clear;
            change.skipped = Some(false);
            Ok(plan(Some(ProjectStatus::Generating), vec![change]))
        }

        WorkflowAction::Cancel => {
            if !matches!(
                project_status,
                ProjectStatus::Generating | ProjectStatus::Paused
            ) {
                return Err(CoreError::Conflict(format!(
                    "Cannot cancel a project that is {project_status}"
                )));
            }
            let mut changes = Vec::new();
            for scene in scenes {
                let mut change = SceneChange::new(scene.scene_id);
                for kind in MediaKind::ALL {
                    let status = scene.kinds.status(kind);
                    if status.is_in_flight() || status.is_dispatchable() {
                        change
                            .updates
                            .push(KindUpdate::transition(kind, AssetStatus::Failed)?);
                    }
                }
                if !change.updates.is_empty() {
                    change.error_message = MessageUpdate::Set(CANCELLED_MESSAGE.into());
                    changes.push(change);
                }
            }
            Ok(plan(Some(ProjectStatus::Failed), changes))
        }

        WorkflowAction::Pause => {
            if project_status != ProjectStatus::Generating {
                return Err(CoreError::Conflict(format!(
                    "Cannot pause a project that is {project_status}"
                )));
            }
            Ok(plan(Some(ProjectStatus::Paused), Vec::new()))
        }

        WorkflowAction::Resume => {
            if project_status != ProjectStatus::Paused {
                return Err(CoreError::Conflict(format!(
                    "Cannot resume a project that is {project_status}"
                )));
            }
            let mut changes = Vec::new();
            for scene in scenes {
                let mut change = SceneChange::new(scene.scene_id);
                for kind in MediaKind::ALL {
                    let state = scene.kinds.get(kind);
                    if state.status.is_in_flight() {
                        change.updates.push(
                            KindUpdate::transition(kind, AssetStatus::Pending)?
                                .with_attempts(state.attempts),
                        );
                    }
                }
                if !change.is_empty() {
                    changes.push(change);
                }
            }
            Ok(plan(Some(ProjectStatus::Generating), changes))
        }

        WorkflowAction::SkipScene { scene_id } => {
            let scene = find_scene(scenes, *scene_id)?;
            let mut change = SceneChange::new(scene.scene_id);
            for kind in MediaKind::ALL {
                let status = scene.kinds.status(kind);
                if status != AssetStatus::Completed && status != AssetStatus::Draft {
                    change.updates.push(KindUpdate::reset(kind, AssetStatus::Draft)?);
                }
            }
            change.skipped = Some(true);
            change.error_message = MessageUpdate::Clear;
            Ok(plan(None, vec![change]))
        }

        WorkflowAction::ReorderScenes { scene_ids } => {
            let known: HashSet<DbId> = scenes.iter().map(|s| s.scene_id).collect();
            let requested: HashSet<DbId> = scene_ids.iter().copied().collect();
            if requested.len() != scene_ids.len() || requested != known {
                return Err(CoreError::Validation(
                    "scene_ids must list every scene of the project exactly once".into(),
                ));
            }
            Ok(CommandPlan {
                project_status: None,
                scene_changes: Vec::new(),
                reorder: Some(scene_ids.clone()),
            })
        }
    }
}

fn plan(project_status: Option<ProjectStatus>, scene_changes: Vec<SceneChange>) -> CommandPlan {
    CommandPlan {
        project_status,
        scene_changes,
        reorder: None,
    }
}

fn require_scenes(scenes: &[SceneSnapshot<'_>]) -> Result<(), CoreError> {
    if scenes.is_empty() {
        return Err(CoreError::Validation("Project has no scenes".into()));
    }
    Ok(())
}

fn require_not_paused(project_status: ProjectStatus) -> Result<(), CoreError> {
    if project_status == ProjectStatus::Paused {
        return Err(CoreError::Conflict(
            "Project is paused; resume it before generating".into(),
        ));
    }
    Ok(())
}

fn find_scene<'s, 'a>(
    scenes: &'s [SceneSnapshot<'a>],
    scene_id: DbId,
) -> Result<&'s SceneSnapshot<'a>, CoreError> {
    scenes
        .iter()
        .find(|s| s.scene_id == scene_id)
        .ok_or(CoreError::NotFound {
            entity: "Scene",
            id: scene_id,
        })
}

/// Queue one kind of a scene, refusing to clobber a running worker.
fn queue_kind(scene: &SceneSnapshot<'_>, kind: MediaKind) -> Result<KindUpdate, CoreError> {
    if scene.kinds.status(kind).is_in_flight() {
        return Err(CoreError::Conflict(format!(
            "{kind} generation is already running for scene {}",
            scene.scene_id
        )));
    }
    KindUpdate::reset(kind, AssetStatus::Queued)
}

// ---------------------------------------------------------------------------
// Progress message
// ---------------------------------------------------------------------------

/// Human-readable progress line for the workflow state view.
pub fn generation_message(project_status: ProjectStatus, scenes: &[SceneSnapshot<'_>]) -> String {
    let mut total = 0usize;
    let mut completed = 0usize;
    let mut running = 0usize;
    let mut failed = 0usize;
    for scene in scenes.iter().filter(|s| !s.skipped) {
        for kind in scene.applicable_kinds() {
            total += 1;
            let status = scene.kinds.status(kind);
            if status == AssetStatus::Completed {
                completed += 1;
            } else if status.is_in_flight() {
                running += 1;
            } else if status.is_failed() {
                failed += 1;
            }
        }
    }

    match project_status {
        ProjectStatus::Draft => format!("Ready to generate {total} assets"),
        ProjectStatus::Generating => {
            format!("Generating: {completed} of {total} assets complete ({running} in progress)")
        }
        ProjectStatus::Paused => format!("Paused: {completed} of {total} assets complete"),
        ProjectStatus::Completed => format!("All {total} assets generated"),
        ProjectStatus::Failed => {
            format!("Generation failed: {failed} failed, {completed} of {total} complete")
        }
    }
}
