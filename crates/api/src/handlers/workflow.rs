//! Handlers for the `/workflow` resource.
//!
//! `pollTasks` and `complete` are called by generation workers and are
//! gated by [`WorkerAuth`]; the rest act for an authenticated user.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use storyforge_core::dispatch::WorkflowAction;
use storyforge_core::scene_state::{MediaKind, WorkerReport};
use storyforge_core::status::AssetStatus;
use storyforge_core::types::DbId;
use storyforge_db::models::scene::SceneView;

use crate::engine::workflow::WorkflowEngine;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::worker::WorkerAuth;
use crate::query::ProjectIdParams;
use crate::response::CompleteTaskResponse;
use crate::state::AppState;

fn engine(state: &AppState) -> WorkflowEngine<'_> {
    WorkflowEngine::new(
        &state.pool,
        state.event_bus.as_ref(),
        state.config.retry_policy(),
    )
}

/// Body of `POST /api/v1/workflow/complete`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskRequest {
    pub project_id: DbId,
    pub scene_id: DbId,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub status: AssetStatus,
    pub output_url: Option<String>,
    pub error: Option<String>,
}

/// Body of `POST /api/v1/workflow/command`: the action plus its target.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub project_id: DbId,
    /// Required while the project is locked.
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub action: WorkflowAction,
}

/// Body of `POST /api/v1/workflow/scenes/{id}/reuse`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReuseRequest {
    pub url: String,
    /// Catalog entry the URL came from, if any.
    pub asset_id: Option<DbId>,
    pub session_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Worker endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/workflow/pollTasks?projectId=
///
/// Claim the next task. 204 when nothing is dispatchable.
pub async fn poll_tasks(
    _worker: WorkerAuth,
    State(state): State<AppState>,
    Query(params): Query<ProjectIdParams>,
) -> AppResult<Response> {
    match engine(&state).next_task(params.project_id).await? {
        Some(task) => Ok(Json(task).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// POST /api/v1/workflow/complete
///
/// Apply a worker's success or failure report. Stale or malformed reports
/// are rejected without changing anything.
pub async fn complete_task(
    _worker: WorkerAuth,
    State(state): State<AppState>,
    Json(input): Json<CompleteTaskRequest>,
) -> AppResult<impl IntoResponse> {
    let report = WorkerReport {
        kind: input.kind,
        status: input.status,
        output_url: input.output_url,
        error: input.error,
    };

    let outcome = engine(&state)
        .complete_task(input.project_id, input.scene_id, &report)
        .await?;

    Ok(Json(CompleteTaskResponse {
        accepted: true,
        status: outcome.decision.update.status(),
        retried: outcome.decision.retried,
        project_status: outcome.project.status(),
        scene: SceneView::from(&outcome.scene),
    }))
}

// ---------------------------------------------------------------------------
// User endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/workflow/command
///
/// Run a workflow command and return the resulting state.
pub async fn handle_command(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CommandRequest>,
) -> AppResult<impl IntoResponse> {
    let view = engine(&state)
        .handle_command(
            &auth,
            input.project_id,
            input.session_id.as_deref(),
            &input.action,
        )
        .await?;
    Ok(Json(view))
}

/// GET /api/v1/workflow/state/{projectId}
pub async fn get_state(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let view = engine(&state).state(&auth, project_id).await?;
    Ok(Json(view))
}

/// POST /api/v1/workflow/scenes/{id}/reuse
///
/// Complete the scene's primary kind with an existing asset.
pub async fn reuse_asset(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(scene_id): Path<DbId>,
    Json(input): Json<ReuseRequest>,
) -> AppResult<impl IntoResponse> {
    let scene = engine(&state)
        .reuse_asset(
            &auth,
            scene_id,
            &input.url,
            input.asset_id,
            input.session_id.as_deref(),
        )
        .await?;
    Ok(Json(scene))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_request_flattens_the_action() {
        let req: CommandRequest = serde_json::from_value(serde_json::json!({
            "projectId": 4,
            "sessionId": "s1",
            "action": "generate_kind",
            "sceneId": 9,
            "kind": "audio",
        }))
        .unwrap();
        assert_eq!(req.project_id, 4);
        assert_eq!(req.session_id.as_deref(), Some("s1"));
        assert_eq!(
            req.action,
            WorkflowAction::GenerateKind {
                scene_id: 9,
                kind: MediaKind::Audio,
            }
        );
    }

    #[test]
    fn complete_request_reads_type_as_kind() {
        let req: CompleteTaskRequest = serde_json::from_value(serde_json::json!({
            "projectId": 1,
            "sceneId": 2,
            "type": "video",
            "status": "completed",
            "outputUrl": "https://cdn.example/v.mp4",
        }))
        .unwrap();
        assert_eq!(req.kind, MediaKind::Video);
        assert_eq!(req.status, AssetStatus::Completed);
        assert!(req.error.is_none());
    }
}
