//! Integration tests for the durable job queue.

use sqlx::PgPool;
use storyforge_core::status::JobStatus;
use storyforge_db::models::job::{Job, JobView, SubmitJob};
use storyforge_db::repositories::JobRepo;

fn schedule_job() -> SubmitJob {
    SubmitJob {
        job_type: "schedule_generation".to_string(),
        parameters: serde_json::json!({ "persona_id": 7, "message": "weekly plan" }),
        max_attempts: None,
    }
}

async fn reload(pool: &PgPool, id: i64) -> Job {
    JobRepo::find_by_id(pool, id).await.unwrap().unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_submit_then_claim_then_complete(pool: PgPool) {
    let job = JobRepo::submit(&pool, 1, &schedule_job()).await.unwrap();
    assert_eq!(job.status(), JobStatus::Queued);
    assert_eq!(job.max_attempts, 3);

    let claimed = JobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.status(), JobStatus::Active);
    assert_eq!(claimed.attempts, 1);

    assert!(JobRepo::update_progress(&pool, job.id, 40).await.unwrap());
    assert!(JobRepo::complete(&pool, job.id, &serde_json::json!({ "posts": 3 }))
        .await
        .unwrap());

    let done = reload(&pool, job.id).await;
    assert_eq!(done.status(), JobStatus::Completed);
    assert_eq!(done.progress_percent, 100);

    let view = JobView::from(&done);
    assert_eq!(view.result, Some(serde_json::json!({ "posts": 3 })));
    assert_eq!(view.error, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_terminal_states_are_final(pool: PgPool) {
    let job = JobRepo::submit(&pool, 1, &schedule_job()).await.unwrap();
    JobRepo::claim_next(&pool).await.unwrap().unwrap();
    assert!(JobRepo::fail(&pool, job.id, "bad persona").await.unwrap());

    // Late writes from a stale worker are ignored.
    assert!(!JobRepo::complete(&pool, job.id, &serde_json::json!({})).await.unwrap());
    assert!(!JobRepo::update_progress(&pool, job.id, 90).await.unwrap());
    assert!(!JobRepo::retry_later(&pool, job.id, "again", 0.0).await.unwrap());

    let stored = reload(&pool, job.id).await;
    assert_eq!(stored.status(), JobStatus::Failed);
    assert_eq!(JobView::from(&stored).error.as_deref(), Some("bad persona"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_progress_requires_active_job(pool: PgPool) {
    let job = JobRepo::submit(&pool, 1, &schedule_job()).await.unwrap();
    assert!(!JobRepo::update_progress(&pool, job.id, 10).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_claims_take_distinct_jobs(pool: PgPool) {
    let a = JobRepo::submit(&pool, 1, &schedule_job()).await.unwrap();
    let b = JobRepo::submit(&pool, 1, &schedule_job()).await.unwrap();

    let (first, second, third) = tokio::join!(
        JobRepo::claim_next(&pool),
        JobRepo::claim_next(&pool),
        JobRepo::claim_next(&pool),
    );
    let mut ids: Vec<i64> = [first.unwrap(), second.unwrap(), third.unwrap()]
        .into_iter()
        .flatten()
        .map(|j| j.id)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![a.id, b.id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_retry_later_delays_next_claim(pool: PgPool) {
    let job = JobRepo::submit(&pool, 1, &schedule_job()).await.unwrap();
    JobRepo::claim_next(&pool).await.unwrap().unwrap();

    assert!(JobRepo::retry_later(&pool, job.id, "timeout", 60.0).await.unwrap());
    assert!(JobRepo::claim_next(&pool).await.unwrap().is_none());

    let stored = reload(&pool, job.id).await;
    assert_eq!(stored.status(), JobStatus::Queued);
    assert_eq!(stored.attempts, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stale_active_jobs_are_recovered(pool: PgPool) {
    let fresh = JobRepo::submit(&pool, 1, &schedule_job()).await.unwrap();
    JobRepo::claim_next(&pool).await.unwrap().unwrap();

    let exhausted = JobRepo::submit(
        &pool,
        1,
        &SubmitJob {
            max_attempts: Some(1),
            ..schedule_job()
        },
    )
    .await
    .unwrap();
    JobRepo::claim_next(&pool).await.unwrap().unwrap();

    sqlx::query("UPDATE jobs SET claimed_at = NOW() - INTERVAL '1 hour'")
        .execute(&pool)
        .await
        .unwrap();

    let (requeued, failed) = JobRepo::requeue_stale(&pool, 600.0).await.unwrap();
    assert_eq!((requeued, failed), (1, 1));
    assert_eq!(reload(&pool, fresh.id).await.status(), JobStatus::Queued);
    assert_eq!(reload(&pool, exhausted.id).await.status(), JobStatus::Failed);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_expired_terminal_jobs_are_swept(pool: PgPool) {
    let old = JobRepo::submit(&pool, 1, &schedule_job()).await.unwrap();
    JobRepo::claim_next(&pool).await.unwrap().unwrap();
    JobRepo::complete(&pool, old.id, &serde_json::json!({})).await.unwrap();
    sqlx::query("UPDATE jobs SET completed_at = NOW() - INTERVAL '2 days' WHERE id = $1")
        .bind(old.id)
        .execute(&pool)
        .await
        .unwrap();

    let queued = JobRepo::submit(&pool, 1, &schedule_job()).await.unwrap();

    let deleted = JobRepo::delete_expired(&pool, 24).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(JobRepo::find_by_id(&pool, old.id).await.unwrap().is_none());
    assert!(JobRepo::find_by_id(&pool, queued.id).await.unwrap().is_some());
}
