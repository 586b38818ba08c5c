//! Server-sent event streams of workflow updates.
//!
//! Every stream opens with a `connected` frame; project streams follow it
//! with an `init` snapshot of the workflow state. Frames are plain
//! `data: <json>` lines carrying the event `type` inside the JSON.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use storyforge_core::job_events::{EVENT_CONNECTED, EVENT_INIT};
use storyforge_core::types::DbId;
use storyforge_db::models::workflow::WorkflowStateView;
use storyforge_db::repositories::SceneRepo;
use storyforge_events::UpdateEvent;
use tokio_stream::wrappers::BroadcastStream;

use crate::engine::workflow::{authorize_owner, find_project};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::state::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn to_frame(event: &UpdateEvent) -> Option<Result<Event, Infallible>> {
    match Event::default().json_data(event) {
        Ok(frame) => Some(Ok(frame)),
        Err(e) => {
            tracing::warn!(event_type = %event.event_type, error = %e, "Failed to encode SSE frame");
            None
        }
    }
}

/// Live events from the bus, optionally narrowed to one project.
fn live_events(
    state: &AppState,
    project_id: Option<DbId>,
) -> impl Stream<Item = UpdateEvent> + Send + 'static {
    BroadcastStream::new(state.event_bus.subscribe()).filter_map(move |received| async move {
        match received {
            Ok(event) if project_id.is_none_or(|id| event.concerns(id)) => Some(event),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "SSE listener lagged, events dropped");
                None
            }
        }
    })
}

fn into_sse(
    events: impl Stream<Item = UpdateEvent> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = events.filter_map(|event| async move { to_frame(&event) });
    Sse::new(frames).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

/// GET /api/v1/events/{projectId}
pub async fn project_events(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let project = find_project(&state.pool, project_id).await?;
    authorize_owner(&auth, &project)?;

    // Subscribe before reading the snapshot so no change falls in between.
    let live = live_events(&state, Some(project_id));

    let scenes = SceneRepo::list_by_project(&state.pool, project_id).await?;
    let snapshot = serde_json::to_value(WorkflowStateView::build(&project, &scenes, Utc::now()))
        .map_err(|e| AppError::InternalError(format!("Failed to encode state: {e}")))?;

    let head = vec![
        UpdateEvent::new(EVENT_CONNECTED)
            .for_project(project_id)
            .with_payload(serde_json::json!({ "project_id": project_id })),
        UpdateEvent::new(EVENT_INIT)
            .for_project(project_id)
            .with_payload(snapshot),
    ];

    tracing::info!(project_id, user_id = auth.user_id, "SSE client connected");
    Ok(into_sse(stream::iter(head).chain(live)))
}

/// GET /api/v1/events
///
/// Every event on the bus. Admin only.
pub async fn all_events(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let live = live_events(&state, None);
    let connected = UpdateEvent::new(EVENT_CONNECTED);

    tracing::info!(user_id = admin.user_id, "SSE admin client connected");
    into_sse(stream::iter([connected]).chain(live))
}
