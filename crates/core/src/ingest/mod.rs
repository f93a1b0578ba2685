//! Statement ingestion pipeline.
//!
//! An [`IngestPipeline`] is an ordered list of [`Step`]s run against a
//! [`PipelineState`]. The standard list fetches a statement, deduplicates it
//! by checksum, has the parsing service extract transactions, validates
//! their categories and persists them, tracking everything in a parsing run.

mod config;
mod engine;
mod error;
mod handler;
mod service;
mod state;
pub mod steps;

pub use config::IngestConfig;
pub use engine::{IngestPipeline, Step};
pub use error::{CategoryFailure, PipelineError, StepError, ValidationReport};
pub use handler::PipelineJobHandler;
pub use service::IngestService;
pub use state::{truncate_message, IngestOutcome, PipelineState, MAX_FAILURE_MESSAGE_CHARS};
