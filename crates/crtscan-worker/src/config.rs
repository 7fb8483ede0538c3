//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Jobs waiting for the inference worker
    pub submit_capacity: usize,
    /// Finished job reports waiting for the persistence worker
    pub result_capacity: usize,
    /// Progress updates waiting for the relay
    pub progress_capacity: usize,
    /// Pipeline events waiting for the caller
    pub event_capacity: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Log a progress line every this many samples
    pub progress_stride: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            submit_capacity: 16,
            result_capacity: 4,
            progress_capacity: 256,
            event_capacity: 64,
            shutdown_timeout: Duration::from_secs(30),
            progress_stride: 100,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            submit_capacity: env_or("WORKER_SUBMIT_CAPACITY", defaults.submit_capacity).max(1),
            result_capacity: env_or("WORKER_RESULT_CAPACITY", defaults.result_capacity).max(1),
            progress_capacity: env_or("WORKER_PROGRESS_CAPACITY", defaults.progress_capacity).max(1),
            event_capacity: env_or("WORKER_EVENT_CAPACITY", defaults.event_capacity).max(1),
            shutdown_timeout: Duration::from_secs(env_or(
                "WORKER_SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout.as_secs(),
            )),
            progress_stride: env_or("WORKER_PROGRESS_STRIDE", defaults.progress_stride).max(1),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
