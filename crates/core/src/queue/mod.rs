//! Asynchronous parse job queue.
//!
//! Jobs are persisted in a [`JobStore`], buffered in a bounded channel and
//! processed by a fixed pool of workers. Failed jobs are retried with linear
//! backoff until their retry ceiling, then marked failed. Handlers can
//! report a failure as permanent to skip the remaining attempts.

mod config;
mod delay;
mod error;
mod handler;
mod pool;
mod store;
mod types;

pub use config::QueueConfig;
pub use delay::{RetryDelay, TokioDelay};
pub use error::QueueError;
pub use handler::{JobError, JobHandler};
pub use pool::JobQueue;
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
pub use types::{JobFilter, JobStatus, ParseDocumentJob};
