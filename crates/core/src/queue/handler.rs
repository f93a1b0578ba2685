use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::types::ParseDocumentJob;

/// Failure reported by a [`JobHandler`].
///
/// Plain `anyhow` errors convert to [`JobError::Retryable`], so handlers can
/// keep using `?`.
#[derive(Debug, Error)]
pub enum JobError {
    /// Counts as one attempt; the job is retried until its ceiling.
    #[error("{0:#}")]
    Retryable(anyhow::Error),

    /// Fails the job at once; retrying cannot change the outcome.
    #[error("{0:#}")]
    Permanent(anyhow::Error),
}

impl JobError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

impl From<anyhow::Error> for JobError {
    fn from(error: anyhow::Error) -> Self {
        Self::Retryable(error)
    }
}

/// Work performed by a queue worker for each job.
///
/// `cancel` fires when the queue gives up on in-flight work during shutdown.
/// Handlers should wind down promptly when it does; the worker waits for the
/// returned future rather than dropping it.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(
        &self,
        job: &ParseDocumentJob,
        cancel: &CancellationToken,
    ) -> Result<(), JobError>;
}
