//! Handlers for the `/jobs` resource.
//!
//! Users see only their own jobs; admins see all of them.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use storyforge_core::error::CoreError;
use storyforge_core::types::DbId;
use storyforge_db::models::job::{JobView, SubmitJob};
use storyforge_db::repositories::JobRepo;
use storyforge_worker::handlers::schedule::{ScheduleParams, JOB_TYPE};

use crate::error::{is_unavailable, AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::JobAccepted;
use crate::state::AppState;

/// Queue failures surface as 503 instead of a generic 500.
fn queue_error(err: sqlx::Error) -> AppError {
    if is_unavailable(&err) {
        AppError::Core(CoreError::QueueUnavailable(err.to_string()))
    } else {
        AppError::Database(err)
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/schedule
///
/// Queue a weekly schedule generation. Returns 202 with the job id as soon
/// as the job is stored; poll `GET /jobs/{id}` for the result.
pub async fn submit_schedule(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(params): Json<ScheduleParams>,
) -> AppResult<impl IntoResponse> {
    params
        .validate()
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let parameters = serde_json::to_value(&params)
        .map_err(|e| AppError::InternalError(format!("Failed to encode job parameters: {e}")))?;

    let job = JobRepo::submit(
        &state.pool,
        auth.user_id,
        &SubmitJob {
            job_type: JOB_TYPE.to_string(),
            parameters,
            max_attempts: Some(state.config.job_max_attempts),
        },
    )
    .await
    .map_err(queue_error)?;

    tracing::info!(
        job_id = job.id,
        job_type = %job.job_type,
        user_id = auth.user_id,
        "Job submitted",
    );

    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id: job.id })))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
///
/// Current status, progress, and (once terminal) result or error.
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::find_by_id(&state.pool, job_id)
        .await
        .map_err(queue_error)?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    if !auth.can_access(job.submitted_by) {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot view another user's job".into(),
        )));
    }

    Ok(Json(JobView::from(&job)))
}
