use std::sync::Arc;

use storyforge_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the pool and everything else is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: storyforge_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Fan-out of state changes to SSE listeners.
    pub event_bus: Arc<EventBus>,
}
