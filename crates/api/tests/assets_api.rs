//! HTTP-level integration tests for the asset reuse catalog.

mod common;

use axum::http::StatusCode;
use common::{
    admin_token, body_json, get_authed, post_authed, post_empty_authed, seed_project, user_token,
};
use serde_json::json;
use sqlx::PgPool;

/// Complete one scene image through manual reuse, then index it.
async fn seed_catalog(pool: &PgPool) {
    let (_, scenes) = seed_project(pool, 1, 1).await;
    let response = post_authed(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/workflow/scenes/{}/reuse", scenes[0].id),
        &user_token(1),
        json!({ "url": "https://cdn.example.com/forest.png" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/assets/catalog",
        &admin_token(99),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let summary = body_json(response).await;
    assert_eq!(summary["images"], 1);
    assert_eq!(summary["total"], 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_catalog_backfill_requires_admin(pool: PgPool) {
    let response = post_authed(
        common::build_test_app(pool),
        "/api/v1/assets/catalog",
        &user_token(1),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_catalog_backfill_is_idempotent(pool: PgPool) {
    seed_catalog(&pool).await;

    let response = post_authed(
        common::build_test_app(pool),
        "/api/v1/assets/catalog",
        &admin_token(99),
        json!({}),
    )
    .await;
    assert_eq!(body_json(response).await["total"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_search_finds_cataloged_asset(pool: PgPool) {
    seed_catalog(&pool).await;

    let response = post_authed(
        common::build_test_app(pool),
        "/api/v1/assets/search",
        &user_token(1),
        json!({ "description": "misty forest", "assetType": "IMAGE" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    let hit = &json["matches"][0];
    assert_eq!(hit["source"], "catalog");
    assert_eq!(hit["url"], "https://cdn.example.com/forest.png");
    assert_eq!(hit["similarity"], 1.0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_search_with_blank_description_is_rejected(pool: PgPool) {
    let response = post_authed(
        common::build_test_app(pool),
        "/api/v1/assets/search",
        &user_token(1),
        json!({ "description": " ", "assetType": "IMAGE" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_track_reuse_of_unknown_asset_is_not_tracked(pool: PgPool) {
    let response = post_authed(
        common::build_test_app(pool),
        "/api/v1/assets/777777/track-reuse",
        &user_token(1),
        json!({ "channelId": "channel-1" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["tracked"], false);
    assert!(json.get("asset").is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_track_reuse_updates_list_and_stats(pool: PgPool) {
    seed_catalog(&pool).await;
    let token = user_token(1);

    let response = get_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/assets/catalog?asset_type=image",
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["total"], 1);
    let asset_id = page["assets"][0]["id"].as_i64().unwrap();
    assert_eq!(page["assets"][0]["reuse_count"], 0);

    let response = post_authed(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/assets/{asset_id}/track-reuse"),
        &token,
        json!({ "channelId": "channel-2" }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["tracked"], true);
    assert_eq!(json["asset"]["reuse_count"], 1);
    assert_eq!(json["asset"]["last_used_in_channel"], "channel-2");

    let response = get_authed(
        common::build_test_app(pool),
        "/api/v1/assets/catalog/stats",
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["total_assets"], 1);
    assert_eq!(stats["total_reuses"], 1);
    assert_eq!(stats["reuse_rate"], 0.5);
    assert_eq!(stats["by_type"].as_array().unwrap().len(), 4);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_track_reuse_without_body_counts_reuse(pool: PgPool) {
    seed_catalog(&pool).await;
    let token = user_token(1);

    let response = get_authed(
        common::build_test_app(pool.clone()),
        "/api/v1/assets/catalog?asset_type=image",
        &token,
    )
    .await;
    let asset_id = body_json(response).await["assets"][0]["id"].as_i64().unwrap();

    let response = post_empty_authed(
        common::build_test_app(pool),
        &format!("/api/v1/assets/{asset_id}/track-reuse"),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["tracked"], true);
    assert_eq!(json["asset"]["reuse_count"], 1);
}
