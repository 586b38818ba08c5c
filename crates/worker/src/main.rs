use std::sync::Arc;
use std::time::Duration;

use storyforge_events::NullNotifier;
use storyforge_worker::handlers::ScheduleGenerationHandler;
use storyforge_worker::{maintenance, JobStore, JobWorkerPool, PgJobStore, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyforge_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = storyforge_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    storyforge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let config = WorkerConfig::from_env();
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool));

    // Recover jobs orphaned by a previous run before claiming new ones.
    if let Err(e) = maintenance::sweep(store.as_ref(), &config).await {
        tracing::error!(error = %e, "Startup job recovery failed");
    }

    let workers = Arc::new(
        JobWorkerPool::new(store.clone(), Arc::new(NullNotifier), config.clone())
            .register(Arc::new(ScheduleGenerationHandler::new(&config))),
    );

    let cancel = CancellationToken::new();
    let mut handles = workers.spawn(cancel.clone());
    handles.push(tokio::spawn(maintenance::run(
        store,
        config.clone(),
        cancel.clone(),
    )));

    tracing::info!(concurrency = config.concurrency, "Worker started");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, finishing in-flight jobs");
    cancel.cancel();

    let drain = futures::future::join_all(handles);
    if tokio::time::timeout(Duration::from_secs(30), drain).await.is_err() {
        tracing::warn!("Jobs still running after 30s, exiting");
    }
    tracing::info!("Worker stopped");
}
