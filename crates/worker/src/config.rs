use std::time::Duration;

/// Job worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Jobs executed concurrently (default: `2`).
    pub concurrency: usize,
    /// Idle wait between claim attempts (default: `1000` ms).
    pub poll_interval: Duration,
    /// First retry delay; doubles on every further attempt (default: `1000` ms).
    pub base_backoff: Duration,
    /// How long terminal jobs are kept (default: `24` h).
    pub retention_hours: i32,
    /// Active jobs claimed longer ago than this are presumed orphaned
    /// (default: `600` s).
    pub lease: Duration,
    /// Interval of the lease/retention sweep (default: `60` s).
    pub maintenance_interval: Duration,
    /// Base URL of the schedule generation service.
    pub schedule_service_url: String,
    /// Timeout for calls to the schedule generation service (default: `120` s).
    pub schedule_timeout: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                  |
    /// |------------------------------|--------------------------|
    /// | `JOB_CONCURRENCY`            | `2`                      |
    /// | `JOB_POLL_INTERVAL_MS`       | `1000`                   |
    /// | `JOB_BACKOFF_BASE_MS`        | `1000`                   |
    /// | `JOB_RETENTION_HOURS`        | `24`                     |
    /// | `JOB_LEASE_SECS`             | `600`                    |
    /// | `JOB_MAINTENANCE_SECS`       | `60`                     |
    /// | `SCHEDULE_SERVICE_URL`       | `http://localhost:8000`  |
    /// | `SCHEDULE_TIMEOUT_SECS`      | `120`                    |
    pub fn from_env() -> Self {
        let concurrency: usize = std::env::var("JOB_CONCURRENCY")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("JOB_CONCURRENCY must be a valid usize");
        assert!(concurrency > 0, "JOB_CONCURRENCY must be at least 1");

        let poll_interval_ms: u64 = std::env::var("JOB_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("JOB_POLL_INTERVAL_MS must be a valid u64");

        let backoff_ms: u64 = std::env::var("JOB_BACKOFF_BASE_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("JOB_BACKOFF_BASE_MS must be a valid u64");

        let retention_hours: i32 = std::env::var("JOB_RETENTION_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .expect("JOB_RETENTION_HOURS must be a valid i32");

        let lease_secs: u64 = std::env::var("JOB_LEASE_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("JOB_LEASE_SECS must be a valid u64");

        let maintenance_secs: u64 = std::env::var("JOB_MAINTENANCE_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("JOB_MAINTENANCE_SECS must be a valid u64");

        let schedule_service_url = std::env::var("SCHEDULE_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".into());

        let schedule_timeout_secs: u64 = std::env::var("SCHEDULE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("SCHEDULE_TIMEOUT_SECS must be a valid u64");

        Self {
            concurrency,
            poll_interval: Duration::from_millis(poll_interval_ms),
            base_backoff: Duration::from_millis(backoff_ms),
            retention_hours,
            lease: Duration::from_secs(lease_secs),
            maintenance_interval: Duration::from_secs(maintenance_secs),
            schedule_service_url,
            schedule_timeout: Duration::from_secs(schedule_timeout_secs),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            poll_interval: Duration::from_millis(1000),
            base_backoff: Duration::from_millis(1000),
            retention_hours: 24,
            lease: Duration::from_secs(600),
            maintenance_interval: Duration::from_secs(60),
            schedule_service_url: "http://localhost:8000".into(),
            schedule_timeout: Duration::from_secs(120),
        }
    }
}
