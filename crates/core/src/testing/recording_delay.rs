//! Retry delay that does not sleep.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::queue::RetryDelay;

/// RetryDelay that returns immediately and records what was requested.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    requested: Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far, in call order.
    pub fn requested(&self) -> Vec<Duration> {
        self.requested
            .lock()
            .map(|requested| requested.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RetryDelay for RecordingDelay {
    async fn wait(&self, duration: Duration) {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(duration);
        }
        tokio::task::yield_now().await;
    }
}
