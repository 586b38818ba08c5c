use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use storyforge_api::config::ServerConfig;
use storyforge_api::router::build_app_router;
use storyforge_api::state::AppState;
use storyforge_events::{EventBus, UpdateNotifier};
use storyforge_worker::handlers::ScheduleGenerationHandler;
use storyforge_worker::{maintenance, JobStore, JobWorkerPool, PgJobStore, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "storyforge_api=debug,storyforge_worker=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = storyforge_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    storyforge_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    storyforge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Job workers ---
    let worker_config = WorkerConfig::from_env();
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));

    if let Err(e) = maintenance::sweep(store.as_ref(), &worker_config).await {
        tracing::error!(error = %e, "Startup job recovery failed");
    }

    let notifier: Arc<dyn UpdateNotifier> = event_bus.clone();
    let workers = Arc::new(
        JobWorkerPool::new(store.clone(), notifier, worker_config.clone())
            .register(Arc::new(ScheduleGenerationHandler::new(&worker_config))),
    );

    let cancel = CancellationToken::new();
    let mut background = workers.spawn(cancel.clone());
    background.push(tokio::spawn(maintenance::run(
        store,
        worker_config.clone(),
        cancel.clone(),
    )));
    tracing::info!(
        concurrency = worker_config.concurrency,
        "Job workers started"
    );

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let drain = futures::future::join_all(background);
    let timeout = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(timeout, drain).await.is_err() {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Background jobs still running, exiting anyway"
        );
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
