//! Shared-secret check for endpoints called by generation workers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use storyforge_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the worker secret.
pub const WORKER_TOKEN_HEADER: &str = "x-worker-token";

/// Marker extractor for worker endpoints.
///
/// When `WORKER_TOKEN` is configured the request must carry it in
/// [`WORKER_TOKEN_HEADER`]; otherwise every caller is accepted.
pub struct WorkerAuth;

impl FromRequestParts<AppState> for WorkerAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.worker_token.as_deref() else {
            return Ok(WorkerAuth);
        };

        let provided = parts
            .headers
            .get(WORKER_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());

        match provided {
            Some(token) if token == expected => Ok(WorkerAuth),
            Some(_) => Err(AppError::Core(CoreError::Unauthorized(
                "Invalid worker token".into(),
            ))),
            None => Err(AppError::Core(CoreError::Unauthorized(format!(
                "Missing {WORKER_TOKEN_HEADER} header"
            )))),
        }
    }
}
