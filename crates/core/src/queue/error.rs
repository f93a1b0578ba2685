use std::time::Duration;

use thiserror::Error;

use super::store::JobStoreError;

/// Errors returned by the job queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    QueueClosed,

    #[error("enqueue cancelled")]
    Cancelled,

    #[error("job queue already started")]
    AlreadyStarted,

    #[error("workers did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("job store error: {0}")]
    Store(#[from] JobStoreError),
}
