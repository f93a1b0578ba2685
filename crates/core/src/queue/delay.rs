//! Timer abstraction used to schedule retries.

use std::time::Duration;

use async_trait::async_trait;

/// Waits before a failed job is re-enqueued.
#[async_trait]
pub trait RetryDelay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Real-time delay backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl RetryDelay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_delay_sleeps() {
        let started = std::time::Instant::now();
        TokioDelay.wait(Duration::from_millis(20)).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
