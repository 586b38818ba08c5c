//! Task dispatch, worker reports, and workflow commands.

use chrono::Utc;
use sqlx::PgPool;
use storyforge_core::catalog::{categorize, AssetType};
use storyforge_core::dispatch::{plan_command, WorkflowAction};
use storyforge_core::error::CoreError;
use storyforge_core::job_events::{
    EVENT_TASK_CLAIMED, EVENT_TASK_COMPLETED, EVENT_TASK_FAILED, EVENT_WORKFLOW_STATE,
};
use storyforge_core::lock::check_command_access;
use storyforge_core::scene_state::{MediaKind, RetryPolicy, WorkerReport};
use storyforge_core::status::AssetStatus;
use storyforge_core::types::DbId;
use storyforge_db::models::asset::NewCatalogAsset;
use storyforge_db::models::project::Project;
use storyforge_db::models::scene::{Scene, SceneView};
use storyforge_db::models::workflow::{CompletionOutcome, Task, WorkflowStateView};
use storyforge_db::repositories::{AssetRepo, ProjectRepo, SceneRepo, WorkflowRepo};
use storyforge_events::{UpdateEvent, UpdateNotifier};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;

/// Workflow operations bound to one request's pool and notifier.
pub struct WorkflowEngine<'a> {
    pool: &'a PgPool,
    notifier: &'a dyn UpdateNotifier,
    policy: RetryPolicy,
}

impl<'a> WorkflowEngine<'a> {
    pub fn new(pool: &'a PgPool, notifier: &'a dyn UpdateNotifier, policy: RetryPolicy) -> Self {
        Self {
            pool,
            notifier,
            policy,
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Claim the next task of a project, if any.
    pub async fn next_task(&self, project_id: DbId) -> AppResult<Option<Task>> {
        let task = WorkflowRepo::claim_next_task(self.pool, project_id).await?;

        if let Some(task) = &task {
            tracing::info!(
                project_id,
                scene_id = task.scene_id,
                kind = %task.kind,
                "Task dispatched",
            );
            self.notifier.publish(
                UpdateEvent::new(EVENT_TASK_CLAIMED)
                    .for_project(project_id)
                    .with_payload(serde_json::json!({
                        "scene_id": task.scene_id,
                        "scene_number": task.scene_number,
                        "kind": task.kind,
                    })),
            );
        }
        Ok(task)
    }

    /// Apply a worker report, index the produced asset, and notify.
    pub async fn complete_task(
        &self,
        project_id: DbId,
        scene_id: DbId,
        report: &WorkerReport,
    ) -> AppResult<CompletionOutcome> {
        let outcome =
            WorkflowRepo::complete_task(self.pool, project_id, scene_id, report, self.policy)
                .await?;
        let decision = &outcome.decision;

        if let Some(warning) = &decision.warning {
            tracing::warn!(project_id, scene_id, kind = %report.kind, warning = %warning, "Out-of-order report applied");
        }

        let succeeded = decision.update.status() == AssetStatus::Completed;
        if succeeded {
            tracing::info!(project_id, scene_id, kind = %report.kind, "Task completed");
            if let Some(url) = decision.update.url() {
                self.index_output(&outcome.project, &outcome.scene, report.kind, url)
                    .await;
            }
        } else {
            tracing::warn!(
                project_id,
                scene_id,
                kind = %report.kind,
                retried = decision.retried,
                error = report.error.as_deref().unwrap_or(""),
                "Task failed",
            );
        }

        let event_type = if succeeded {
            EVENT_TASK_COMPLETED
        } else {
            EVENT_TASK_FAILED
        };
        self.notifier.publish(
            UpdateEvent::new(event_type)
                .for_project(project_id)
                .with_payload(serde_json::json!({
                    "scene_id": scene_id,
                    "kind": report.kind,
                    "status": decision.update.status(),
                    "retried": decision.retried,
                    "error": decision.error_message,
                    "scene": SceneView::from(&outcome.scene),
                })),
        );

        if outcome.project_status_changed.is_some() {
            self.publish_state(&outcome.project).await;
        }

        Ok(outcome)
    }

    /// Register a completed output in the asset catalog.
    ///
    /// Catalog problems are logged and never fail the report.
    async fn index_output(&self, project: &Project, scene: &Scene, kind: MediaKind, url: &str) {
        let Some(description) = scene.description_for(kind) else {
            tracing::debug!(scene_id = scene.id, kind = %kind, "No description, asset not indexed");
            return;
        };
        let categorization = categorize(description);
        let input = NewCatalogAsset {
            asset_type: AssetType::from(kind),
            url: url.to_string(),
            description: description.to_string(),
            tags: categorization.tags,
            category: Some(categorization.category),
            duration_seconds: scene.duration_seconds,
            source_scene_id: Some(scene.id),
            source_project_id: Some(project.id),
        };

        match AssetRepo::register(self.pool, &input).await {
            Ok(Some(asset)) => {
                tracing::info!(asset_id = asset.id, scene_id = scene.id, kind = %kind, "Asset indexed");
            }
            Ok(None) => {
                tracing::debug!(scene_id = scene.id, kind = %kind, "Asset already indexed");
            }
            Err(e) => {
                tracing::warn!(scene_id = scene.id, kind = %kind, error = %e, "Asset indexing failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Run a workflow command on behalf of `user`.
    ///
    /// Ownership (403), the project lock (409) and the command's legality
    /// (409) are all checked under the project row lock before any write.
    pub async fn handle_command(
        &self,
        user: &AuthUser,
        project_id: DbId,
        session_id: Option<&str>,
        action: &WorkflowAction,
    ) -> AppResult<WorkflowStateView> {
        let now = Utc::now();
        let (project, scenes) = WorkflowRepo::apply_command(self.pool, project_id, |project, scenes| {
            authorize_owner(user, project)?;
            check_command_access(project.lock_state(), session_id, now)?;
            plan_command(action, project.status(), scenes)
        })
        .await?;

        tracing::info!(
            project_id,
            action = action.name(),
            user_id = user.user_id,
            status = %project.status(),
            "Workflow command applied",
        );

        let view = WorkflowStateView::build(&project, &scenes, Utc::now());
        self.publish_view(&view);
        Ok(view)
    }

    /// Current workflow state of a project the caller may see.
    pub async fn state(&self, user: &AuthUser, project_id: DbId) -> AppResult<WorkflowStateView> {
        let project = find_project(self.pool, project_id).await?;
        authorize_owner(user, &project)?;
        let scenes = SceneRepo::list_by_project(self.pool, project_id).await?;
        Ok(WorkflowStateView::build(&project, &scenes, Utc::now()))
    }

    /// Complete a scene's primary kind with an existing asset URL, tracking
    /// the reuse when the asset is cataloged.
    pub async fn reuse_asset(
        &self,
        user: &AuthUser,
        scene_id: DbId,
        url: &str,
        asset_id: Option<DbId>,
        session_id: Option<&str>,
    ) -> AppResult<SceneView> {
        if url.trim().is_empty() {
            return Err(CoreError::Validation("url must not be empty".into()).into());
        }

        let now = Utc::now();
        let (project, scene) = WorkflowRepo::reuse_asset(self.pool, scene_id, url, |project| {
            authorize_owner(user, project)?;
            check_command_access(project.lock_state(), session_id, now)
        })
        .await?;

        if let Some(asset_id) = asset_id {
            match AssetRepo::track_reuse(self.pool, asset_id, project.channel_id.as_deref()).await {
                Ok(Some(_)) => {}
                Ok(None) => tracing::debug!(asset_id, "Reused asset is not cataloged"),
                Err(e) => tracing::warn!(asset_id, error = %e, "Failed to track asset reuse"),
            }
        }

        tracing::info!(project_id = project.id, scene_id, "Asset reused for scene");
        self.publish_state(&project).await;
        Ok(SceneView::from(&scene))
    }

    // -----------------------------------------------------------------------
    // Notification
    // -----------------------------------------------------------------------

    async fn publish_state(&self, project: &Project) {
        match SceneRepo::list_by_project(self.pool, project.id).await {
            Ok(scenes) => {
                let view = WorkflowStateView::build(project, &scenes, Utc::now());
                self.publish_view(&view);
            }
            Err(e) => {
                tracing::warn!(project_id = project.id, error = %e, "Failed to load state for notification");
            }
        }
    }

    fn publish_view(&self, view: &WorkflowStateView) {
        match serde_json::to_value(view) {
            Ok(payload) => self.notifier.publish(
                UpdateEvent::new(EVENT_WORKFLOW_STATE)
                    .for_project(view.project_id)
                    .with_payload(payload),
            ),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize workflow state"),
        }
    }
}

/// Load a project or fail with `NotFound`.
pub async fn find_project(pool: &PgPool, project_id: DbId) -> AppResult<Project> {
    ProjectRepo::find_by_id(pool, project_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Project",
            id: project_id,
        }))
}

/// Only the owner (or an admin) may act on a project.
pub fn authorize_owner(user: &AuthUser, project: &Project) -> Result<(), CoreError> {
    if user.can_access(project.owner_id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Only the project owner may do this".into(),
        ))
    }
}
