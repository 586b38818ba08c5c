//! Atomic workflow transitions.
//!
//! Every method here runs in one transaction that starts by locking the
//! project row, so task claims, worker reports, and commands on the same
//! project are serialized. Domain decisions come from
//! `storyforge_core::{dispatch, scene_state}`; this module only loads
//! state, asks, and persists the answer.

use sqlx::{PgPool, Postgres, Transaction};
use storyforge_core::dispatch::{build_payload, select_next, CommandPlan, SceneSnapshot};
use storyforge_core::error::CoreError;
use storyforge_core::scene_state::{
    derive_project_status, evaluate_report, KindUpdate, RetryPolicy, SceneKinds, WorkerReport,
};
use storyforge_core::status::ProjectStatus;
use storyforge_core::types::DbId;

use super::project_repo::{lock_row, set_status};
use super::scene_repo;
use crate::error::DbError;
use crate::models::project::Project;
use crate::models::scene::Scene;
use crate::models::workflow::{CompletionOutcome, Task};

/// Provides the transactional operations behind the task dispatcher.
pub struct WorkflowRepo;

impl WorkflowRepo {
    /// Select and claim the next task for a project.
    ///
    /// Returns `Ok(None)` when nothing is dispatchable. The claim is a
    /// status-guarded update, so a kind is never handed out twice.
    pub async fn claim_next_task(pool: &PgPool, project_id: DbId) -> Result<Option<Task>, DbError> {
        let mut tx = pool.begin().await?;
        let project = lock_row(&mut tx, project_id).await?;
        let scenes = scene_repo::list_in_tx(&mut tx, project_id).await?;

        let kinds: Vec<SceneKinds> = scenes.iter().map(Scene::kinds).collect();
        let snapshots: Vec<SceneSnapshot<'_>> = scenes
            .iter()
            .zip(&kinds)
            .filter(|(scene, _)| !scene.skipped)
            .map(|(scene, kinds)| scene.snapshot(kinds))
            .collect();

        let Some(candidate) = select_next(project.status(), &snapshots) else {
            tx.commit().await?;
            return Ok(None);
        };

        let Some(scene) =
            scene_repo::claim_kind(&mut tx, candidate.scene_id, candidate.kind, candidate.expected)
                .await?
        else {
            tracing::warn!(
                project_id,
                scene_id = candidate.scene_id,
                kind = %candidate.kind,
                "Task claim lost compare-and-swap",
            );
            tx.commit().await?;
            return Ok(None);
        };

        let payload = build_payload(candidate.kind, &scene.task_context(&project));
        tx.commit().await?;

        Ok(Some(Task {
            project_id,
            scene_id: scene.id,
            scene_number: scene.scene_number,
            kind: candidate.kind,
            payload,
        }))
    }

    /// Apply a worker's completion or failure report.
    ///
    /// Rejected reports leave every row untouched. Accepted reports may
    /// move the project to `completed` or `failed`.
    pub async fn complete_task(
        pool: &PgPool,
        project_id: DbId,
        scene_id: DbId,
        report: &WorkerReport,
        policy: RetryPolicy,
    ) -> Result<CompletionOutcome, DbError> {
        let mut tx = pool.begin().await?;
        let project = lock_row(&mut tx, project_id).await?;
        let scene = find_scene_of(&mut tx, project_id, scene_id).await?;

        let kinds = scene.kinds();
        let decision = evaluate_report(project.status(), kinds.get(report.kind), report, policy)?;

        scene_repo::write_kind(&mut tx, scene_id, &decision.update).await?;
        if let Some(message) = &decision.error_message {
            sqlx::query("UPDATE scenes SET error_message = $2 WHERE id = $1")
                .bind(scene_id)
                .bind(message)
                .execute(&mut *tx)
                .await?;
        }

        let (project, project_status_changed) = reevaluate_project(&mut tx, project).await?;
        let scene = find_scene_of(&mut tx, project_id, scene_id).await?;
        tx.commit().await?;

        Ok(CompletionOutcome {
            project,
            scene,
            decision,
            project_status_changed,
        })
    }

    /// Run a workflow command.
    ///
    /// `plan` sees the locked project and its current scenes and either
    /// rejects the command or returns the changes to persist. Ownership and
    /// lock checks belong in `plan` so they happen under the same row lock.
    pub async fn apply_command<F>(
        pool: &PgPool,
        project_id: DbId,
        plan: F,
    ) -> Result<(Project, Vec<Scene>), DbError>
    where
        F: FnOnce(&Project, &[SceneSnapshot<'_>]) -> Result<CommandPlan, CoreError>,
    {
        let mut tx = pool.begin().await?;
        let project = lock_row(&mut tx, project_id).await?;
        let scenes = scene_repo::list_in_tx(&mut tx, project_id).await?;

        let kinds: Vec<SceneKinds> = scenes.iter().map(Scene::kinds).collect();
        let snapshots: Vec<SceneSnapshot<'_>> = scenes
            .iter()
            .zip(&kinds)
            .map(|(scene, kinds)| scene.snapshot(kinds))
            .collect();

        let plan = plan(&project, &snapshots)?;

        for change in &plan.scene_changes {
            for update in &change.updates {
                scene_repo::write_kind(&mut tx, change.scene_id, update).await?;
            }
            scene_repo::write_message(&mut tx, change.scene_id, &change.error_message).await?;
            if let Some(skipped) = change.skipped {
                scene_repo::set_skipped(&mut tx, change.scene_id, skipped).await?;
            }
        }
        if let Some(order) = &plan.reorder {
            scene_repo::renumber(&mut tx, project_id, order).await?;
        }

        let project = match plan.project_status {
            Some(status) if status != project.status() => {
                set_status(&mut tx, project_id, status).await?
            }
            _ => project,
        };
        // Skipping a scene can complete the project.
        let (project, _) = reevaluate_project(&mut tx, project).await?;
        let scenes = scene_repo::list_in_tx(&mut tx, project_id).await?;

        tx.commit().await?;
        Ok((project, scenes))
    }

    /// Mark a scene's primary kind completed with an existing asset URL.
    ///
    /// `authorize` runs against the locked project before anything is
    /// written.
    pub async fn reuse_asset<F>(
        pool: &PgPool,
        scene_id: DbId,
        url: &str,
        authorize: F,
    ) -> Result<(Project, Scene), DbError>
    where
        F: FnOnce(&Project) -> Result<(), CoreError>,
    {
        let mut tx = pool.begin().await?;
        let project_id = scene_repo::find_in_tx(&mut tx, scene_id)
            .await?
            .map(|s| s.project_id)
            .ok_or(CoreError::NotFound {
                entity: "Scene",
                id: scene_id,
            })?;
        let project = lock_row(&mut tx, project_id).await?;
        authorize(&project)?;

        let scene = find_scene_of(&mut tx, project_id, scene_id).await?;
        let kind = scene.media_type().primary_kind();
        if scene.kinds().status(kind).is_in_flight() {
            return Err(CoreError::Conflict(format!(
                "{kind} generation is already running for scene {scene_id}"
            ))
            .into());
        }

        let update = KindUpdate::completed(kind, url)?;
        scene_repo::write_kind(&mut tx, scene_id, &update).await?;
        sqlx::query("UPDATE scenes SET error_message = NULL WHERE id = $1")
            .bind(scene_id)
            .execute(&mut *tx)
            .await?;

        let (project, _) = reevaluate_project(&mut tx, project).await?;
        let scene = find_scene_of(&mut tx, project_id, scene_id).await?;
        tx.commit().await?;
        Ok((project, scene))
    }
}

/// Load a scene and make sure it belongs to `project_id`.
async fn find_scene_of(
    tx: &mut Transaction<'_, Postgres>,
    project_id: DbId,
    scene_id: DbId,
) -> Result<Scene, DbError> {
    scene_repo::find_in_tx(tx, scene_id)
        .await?
        .filter(|scene| scene.project_id == project_id)
        .ok_or(DbError::Core(CoreError::NotFound {
            entity: "Scene",
            id: scene_id,
        }))
}

/// Recompute the aggregate project status from its non-skipped scenes and
/// persist it if it changed.
async fn reevaluate_project(
    tx: &mut Transaction<'_, Postgres>,
    project: Project,
) -> Result<(Project, Option<ProjectStatus>), DbError> {
    let scenes = scene_repo::list_in_tx(tx, project.id).await?;
    let active: Vec<(Scene, SceneKinds)> = scenes
        .into_iter()
        .filter(|scene| !scene.skipped)
        .map(|scene| {
            let kinds = scene.kinds();
            (scene, kinds)
        })
        .collect();

    let next = derive_project_status(
        project.status(),
        active.iter().map(|(scene, kinds)| (scene.media_type(), kinds)),
    );

    match next {
        Some(status) => {
            let project = set_status(tx, project.id, status).await?;
            tracing::info!(project_id = project.id, status = %status, "Project status derived");
            Ok((project, Some(status)))
        }
        None => Ok((project, None)),
    }
}
