//! Job queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the job queue and its worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the job channel. Enqueue blocks while it is full.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Attempts allowed for jobs that don't set their own ceiling.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry delay is `retry_count` times this many seconds.
    #[serde(default = "default_backoff_unit")]
    pub backoff_unit_secs: u64,
}

fn default_workers() -> usize {
    5
}

fn default_buffer_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_unit() -> u64 {
    5
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            buffer_size: default_buffer_size(),
            max_retries: default_max_retries(),
            backoff_unit_secs: default_backoff_unit(),
        }
    }
}

impl QueueConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_unit_secs(mut self, secs: u64) -> Self {
        self.backoff_unit_secs = secs;
        self
    }

    /// Linear backoff before the given retry.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        Duration::from_secs(self.backoff_unit_secs.saturating_mul(u64::from(retry_count)))
    }
}
