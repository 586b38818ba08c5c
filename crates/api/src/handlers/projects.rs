//! Handlers for project locks.
//!
//! Only the project owner (or an admin) may lock or unlock a project.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use storyforge_core::job_events::EVENT_PROJECT_LOCK;
use storyforge_core::status::ProjectStatus;
use storyforge_core::types::DbId;
use storyforge_db::models::project::Project;
use storyforge_db::repositories::ProjectRepo;
use storyforge_events::{UpdateEvent, UpdateNotifier};

use crate::engine::workflow::{authorize_owner, find_project};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LockRequest {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub session_id: String,
    /// Status to apply on release, e.g. `completed` or `failed`.
    pub status: Option<String>,
}

fn publish_lock(state: &AppState, project: &Project) {
    state.event_bus.publish(
        UpdateEvent::new(EVENT_PROJECT_LOCK)
            .for_project(project.id)
            .with_payload(serde_json::json!({
                "locked": project.lock_session_id.is_some(),
                "session_id": project.lock_session_id,
                "expires_at": project.lock_expires_at,
                "status": project.status(),
            })),
    );
}

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{id}/lock
///
/// Acquire (or extend) the project lock for `session_id` and move the
/// project to `generating`. 409 while another session holds a valid lock.
pub async fn acquire_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<LockRequest>,
) -> AppResult<impl IntoResponse> {
    let project = find_project(&state.pool, project_id).await?;
    authorize_owner(&auth, &project)?;

    let project = ProjectRepo::acquire_lock(
        &state.pool,
        project_id,
        &input.session_id,
        state.config.lock_ttl_secs,
    )
    .await?;

    tracing::info!(
        project_id,
        session_id = %input.session_id,
        expires_at = ?project.lock_expires_at,
        "Project lock acquired",
    );
    publish_lock(&state, &project);

    Ok(Json(project))
}

// ---------------------------------------------------------------------------
// Unlock
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{id}/unlock
///
/// Release the lock, optionally applying a final status. 403 while another
/// session holds a valid lock.
pub async fn release_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<UnlockRequest>,
) -> AppResult<impl IntoResponse> {
    let status = input
        .status
        .as_deref()
        .map(|s| {
            ProjectStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown project status '{s}'")))
        })
        .transpose()?;

    let project = find_project(&state.pool, project_id).await?;
    authorize_owner(&auth, &project)?;

    let project =
        ProjectRepo::release_lock(&state.pool, project_id, &input.session_id, status).await?;

    tracing::info!(
        project_id,
        session_id = %input.session_id,
        status = %project.status(),
        "Project lock released",
    );
    publish_lock(&state, &project);

    Ok(Json(project))
}
