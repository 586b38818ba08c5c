use storyforge_core::catalog::DEFAULT_RECENCY_DAYS;
use storyforge_core::lock::DEFAULT_LOCK_TTL_SECS;
use storyforge_core::scene_state::{RetryPolicy, DEFAULT_MAX_TASK_ATTEMPTS};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the JWT
/// secret.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to finish on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Project lock lifetime in seconds (default: `300`).
    pub lock_ttl_secs: i64,
    /// Attempts per scene kind before it is marked failed (default: `2`).
    pub max_task_attempts: i16,
    /// Shared secret expected in `x-worker-token` on worker endpoints.
    /// Worker endpoints are open when unset.
    pub worker_token: Option<String>,
    /// Window in which a channel's own catalog usage excludes an asset
    /// (default: `30` days).
    pub catalog_recency_days: i32,
    /// Attempts per background job (default: `3`).
    pub job_max_attempts: i16,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `LOCK_TTL_SECS`         | `300`                      |
    /// | `MAX_TASK_ATTEMPTS`     | `2`                        |
    /// | `WORKER_TOKEN`          | unset                      |
    /// | `CATALOG_RECENCY_DAYS`  | `30`                       |
    /// | `JOB_MAX_ATTEMPTS`      | `3`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let lock_ttl_secs: i64 = std::env::var("LOCK_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_LOCK_TTL_SECS.to_string())
            .parse()
            .expect("LOCK_TTL_SECS must be a valid i64");
        assert!(lock_ttl_secs > 0, "LOCK_TTL_SECS must be positive");

        let max_task_attempts: i16 = std::env::var("MAX_TASK_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_MAX_TASK_ATTEMPTS.to_string())
            .parse()
            .expect("MAX_TASK_ATTEMPTS must be a valid i16");
        assert!(max_task_attempts >= 1, "MAX_TASK_ATTEMPTS must be at least 1");

        let worker_token = std::env::var("WORKER_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let catalog_recency_days: i32 = std::env::var("CATALOG_RECENCY_DAYS")
            .unwrap_or_else(|_| DEFAULT_RECENCY_DAYS.to_string())
            .parse()
            .expect("CATALOG_RECENCY_DAYS must be a valid i32");

        let job_max_attempts: i16 = std::env::var("JOB_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("JOB_MAX_ATTEMPTS must be a valid i16");
        assert!(job_max_attempts >= 1, "JOB_MAX_ATTEMPTS must be at least 1");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            lock_ttl_secs,
            max_task_attempts,
            worker_token,
            catalog_recency_days,
            job_max_attempts,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_task_attempts,
        }
    }
}
