//! Executor configuration.

use std::time::Duration;

use crate::spool::config::env_parse;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Attempts before an entry is discarded (minimum 1)
    pub max_attempts: u32,
    /// Delay before a failed entry is retried
    pub retry_backoff: Duration,
    /// Idle workers re-check the storage at least this often
    pub poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 3,
            retry_backoff: Duration::from_secs(1),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl ExecutorConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: env_parse("SPOOL_WORKERS").unwrap_or(defaults.workers).max(1),
            max_attempts: env_parse("SPOOL_MAX_ATTEMPTS")
                .unwrap_or(defaults.max_attempts)
                .max(1),
            retry_backoff: env_parse("SPOOL_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
            poll_interval: env_parse("SPOOL_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
        }
    }
}
