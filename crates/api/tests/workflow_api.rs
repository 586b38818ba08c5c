//! HTTP-level integration tests for project locks and the scene workflow.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, get, get_as_worker, get_authed, post_as_worker, post_authed, seed_project,
    user_token,
};
use serde_json::json;
use sqlx::PgPool;

const OWNER: i64 = 1;
const STRANGER: i64 = 2;

async fn generate_all(pool: &PgPool, project_id: i64) {
    let response = post_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/workflow/command",
        &user_token(OWNER),
        json!({ "projectId": project_id, "action": "generate_all" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Locks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lock_conflicts_for_other_session(pool: PgPool) {
    let (project, _) = seed_project(&pool, OWNER, 1).await;
    let token = user_token(OWNER);
    let uri = format!("/api/v1/projects/{}/lock", project.id);

    let response = post_authed(
        common::build_test_app(pool.clone()),
        &uri,
        &token,
        json!({ "session_id": "tab-a" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["lock_session_id"], "tab-a");

    let response = post_authed(
        common::build_test_app(pool),
        &uri,
        &token,
        json!({ "session_id": "tab-b" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "LOCK_CONFLICT");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unlock_by_other_session_is_forbidden(pool: PgPool) {
    let (project, _) = seed_project(&pool, OWNER, 1).await;
    let token = user_token(OWNER);

    post_authed(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{}/lock", project.id),
        &token,
        json!({ "session_id": "tab-a" }),
    )
    .await;

    let unlock = format!("/api/v1/projects/{}/unlock", project.id);
    let response = post_authed(
        common::build_test_app(pool.clone()),
        &unlock,
        &token,
        json!({ "session_id": "tab-b" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_authed(
        common::build_test_app(pool),
        &unlock,
        &token,
        json!({ "session_id": "tab-a", "status": "paused" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["lock_session_id"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unlock_with_unknown_status_is_rejected(pool: PgPool) {
    let (project, _) = seed_project(&pool, OWNER, 1).await;
    let response = post_authed(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{}/unlock", project.id),
        &user_token(OWNER),
        json!({ "session_id": "tab-a", "status": "exploded" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lock_on_missing_project_returns_404(pool: PgPool) {
    let response = post_authed(
        common::build_test_app(pool),
        "/api/v1/projects/999999/lock",
        &user_token(OWNER),
        json!({ "session_id": "tab-a" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lock_on_someone_elses_project_is_forbidden(pool: PgPool) {
    let (project, _) = seed_project(&pool, OWNER, 1).await;
    let response = post_authed(
        common::build_test_app(pool),
        &format!("/api/v1/projects/{}/lock", project.id),
        &user_token(STRANGER),
        json!({ "session_id": "tab-a" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Worker protocol
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_poll_requires_worker_token(pool: PgPool) {
    let (project, _) = seed_project(&pool, OWNER, 1).await;
    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/workflow/pollTasks?projectId={}", project.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_poll_on_idle_project_returns_204(pool: PgPool) {
    let (project, _) = seed_project(&pool, OWNER, 1).await;
    let response = get_as_worker(
        common::build_test_app(pool),
        &format!("/api/v1/workflow/pollTasks?projectId={}", project.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_poll_then_complete_image(pool: PgPool) {
    let (project, scenes) = seed_project(&pool, OWNER, 1).await;
    generate_all(&pool, project.id).await;

    let response = get_as_worker(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/workflow/pollTasks?projectId={}", project.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let task = body_json(response).await;
    assert_eq!(task["projectId"], project.id);
    assert_eq!(task["sceneId"], scenes[0].id);
    assert_eq!(task["kind"], "image");

    let report = json!({
        "projectId": project.id,
        "sceneId": scenes[0].id,
        "type": "image",
        "status": "completed",
        "outputUrl": "https://cdn.example.com/forest.png",
    });
    let response = post_as_worker(
        common::build_test_app(pool.clone()),
        "/api/v1/workflow/complete",
        report.clone(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["accepted"], true);
    assert_eq!(json["status"], "completed");
    assert_eq!(json["retried"], false);
    assert_eq!(json["scene"]["image"]["url"], "https://cdn.example.com/forest.png");

    // The same report again is stale: image is no longer in flight.
    let response = post_as_worker(
        common::build_test_app(pool),
        "/api/v1/workflow/complete",
        report,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INVALID_STATE_TRANSITION");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_first_failure_is_requeued(pool: PgPool) {
    let (project, scenes) = seed_project(&pool, OWNER, 1).await;
    generate_all(&pool, project.id).await;

    get_as_worker(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/workflow/pollTasks?projectId={}", project.id),
    )
    .await;

    let response = post_as_worker(
        common::build_test_app(pool),
        "/api/v1/workflow/complete",
        json!({
            "projectId": project.id,
            "sceneId": scenes[0].id,
            "type": "image",
            "status": "failed",
            "error": "connection reset",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["retried"], true);
    assert_eq!(json["status"], "queued");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_completion_without_url_is_rejected(pool: PgPool) {
    let (project, scenes) = seed_project(&pool, OWNER, 1).await;
    generate_all(&pool, project.id).await;

    let response = post_as_worker(
        common::build_test_app(pool),
        "/api/v1/workflow/complete",
        json!({
            "projectId": project.id,
            "sceneId": scenes[0].id,
            "type": "image",
            "status": "completed",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Commands & state
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_command_from_non_owner_is_forbidden(pool: PgPool) {
    let (project, _) = seed_project(&pool, OWNER, 1).await;
    let response = post_authed(
        common::build_test_app(pool),
        "/api/v1/workflow/command",
        &user_token(STRANGER),
        json!({ "projectId": project.id, "action": "generate_all" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_command_without_lock_session_conflicts(pool: PgPool) {
    let (project, _) = seed_project(&pool, OWNER, 1).await;
    let token = user_token(OWNER);

    post_authed(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/projects/{}/lock", project.id),
        &token,
        json!({ "session_id": "tab-a" }),
    )
    .await;

    let response = post_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/workflow/command",
        &token,
        json!({ "projectId": project.id, "sessionId": "tab-b", "action": "pause" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_authed(
        common::build_test_app(pool),
        "/api/v1/workflow/command",
        &token,
        json!({ "projectId": project.id, "sessionId": "tab-a", "action": "pause" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "paused");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_state_lists_scenes_in_order(pool: PgPool) {
    let (project, scenes) = seed_project(&pool, OWNER, 3).await;
    let response = get_authed(
        common::build_test_app(pool),
        &format!("/api/v1/workflow/state/{}", project.id),
        &user_token(OWNER),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["project_id"], project.id);
    assert_eq!(json["status"], "draft");
    assert_eq!(json["locked"], false);
    let ids: Vec<i64> = json["scenes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, scenes.iter().map(|s| s.id).collect::<Vec<_>>());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_state_of_missing_project_returns_404(pool: PgPool) {
    let response = get_authed(
        common::build_test_app(pool),
        "/api/v1/workflow/state/999999",
        &user_token(OWNER),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reuse_marks_primary_kind_completed(pool: PgPool) {
    let (_, scenes) = seed_project(&pool, OWNER, 1).await;
    let response = post_authed(
        common::build_test_app(pool),
        &format!("/api/v1/workflow/scenes/{}/reuse", scenes[0].id),
        &user_token(OWNER),
        json!({ "url": "https://cdn.example.com/reused.png" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["image"]["status"], "completed");
    assert_eq!(json["image"]["url"], "https://cdn.example.com/reused.png");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reuse_with_blank_url_is_rejected(pool: PgPool) {
    let (_, scenes) = seed_project(&pool, OWNER, 1).await;
    let response = post_authed(
        common::build_test_app(pool),
        &format!("/api/v1/workflow/scenes/{}/reuse", scenes[0].id),
        &user_token(OWNER),
        json!({ "url": "  " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
