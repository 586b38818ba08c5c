#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use jsonwebtoken::{encode, EncodingKey, Header};
use storyforge_api::auth::jwt::{Claims, JwtConfig};
use storyforge_api::config::ServerConfig;
use storyforge_api::middleware::worker::WORKER_TOKEN_HEADER;
use storyforge_api::router::build_app_router;
use storyforge_api::state::AppState;
use storyforge_core::roles::{ROLE_ADMIN, ROLE_USER};
use storyforge_core::types::DbId;
use storyforge_db::models::project::{CreateProject, Project};
use storyforge_db::models::scene::{CreateScene, Scene};
use storyforge_db::repositories::{ProjectRepo, SceneRepo};
use storyforge_events::EventBus;
use tower::ServiceExt;

pub const WORKER_TOKEN: &str = "test-worker-token";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough".to_string(),
            access_token_expiry_mins: 15,
        },
        lock_ttl_secs: 300,
        max_task_attempts: 2,
        worker_token: Some(WORKER_TOKEN.to_string()),
        catalog_recency_days: 30,
        job_max_attempts: 3,
    }
}

/// Build the full application router, using the given database pool.
///
/// Goes through [`build_app_router`] so tests exercise the production
/// middleware stack.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_bus(pool, Arc::new(EventBus::default()))
}

pub fn build_test_app_with_bus(pool: PgPool, event_bus: Arc<EventBus>) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Sign a token the way the identity service does, with the test secret.
fn issue_token(user_id: DbId, role: &str) -> String {
    let jwt = test_config().jwt;
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: now + jwt.access_token_expiry_mins * 60,
        iat: now,
        jti: uuid::Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .unwrap()
}

pub fn user_token(user_id: DbId) -> String {
    issue_token(user_id, ROLE_USER)
}

pub fn admin_token(user_id: DbId) -> String {
    issue_token(user_id, ROLE_ADMIN)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A draft project owned by `owner_id` with `scenes` image scenes.
pub async fn seed_project(pool: &PgPool, owner_id: DbId, scenes: usize) -> (Project, Vec<Scene>) {
    let project = ProjectRepo::create(
        pool,
        owner_id,
        &CreateProject {
            name: "API test".to_string(),
            channel_id: Some("channel-1".to_string()),
            voice_name: Some("narrator".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let mut created = Vec::with_capacity(scenes);
    for i in 0..scenes {
        let scene = SceneRepo::create(
            pool,
            project.id,
            &CreateScene {
                visual_description: Some(format!("Misty forest at dawn {i}")),
                narration: Some(format!("Once upon a time {i}")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        created.push(scene);
    }
    (project, created)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    headers: &[(&str, String)],
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    app.oneshot(request).await.unwrap()
}

fn bearer(token: &str) -> Vec<(&'static str, String)> {
    vec![("authorization", format!("Bearer {token}"))]
}

fn worker() -> Vec<(&'static str, String)> {
    vec![(WORKER_TOKEN_HEADER, WORKER_TOKEN.to_string())]
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, &[], None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, &[], Some(body)).await
}

pub async fn get_authed(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, &bearer(token), None).await
}

pub async fn post_authed(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, &bearer(token), Some(body)).await
}

/// POST with no body and no content type.
pub async fn post_empty_authed(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, &bearer(token), None).await
}

pub async fn get_as_worker(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, &worker(), None).await
}

pub async fn post_as_worker(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, &worker(), Some(body)).await
}

/// Collect the response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
