//! Entry point that wires collaborators into pipeline runs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::config::IngestConfig;
use super::engine::IngestPipeline;
use super::error::PipelineError;
use super::state::{IngestOutcome, PipelineState};
use crate::parser::StatementParser;
use crate::repository::DocumentRepository;
use crate::storage::SourceStorage;

/// Runs the ingestion pipeline for one source locator at a time.
///
/// Each call gets a fresh [`PipelineState`]; the service itself holds no
/// per-run data and can be shared across workers.
pub struct IngestService {
    config: IngestConfig,
    repository: Arc<dyn DocumentRepository>,
    storage: Arc<dyn SourceStorage>,
    parser: Arc<dyn StatementParser>,
    pipeline: IngestPipeline,
}

impl IngestService {
    /// Create a service running the standard pipeline.
    pub fn new(
        config: IngestConfig,
        repository: Arc<dyn DocumentRepository>,
        storage: Arc<dyn SourceStorage>,
        parser: Arc<dyn StatementParser>,
    ) -> Self {
        Self::with_pipeline(config, repository, storage, parser, IngestPipeline::standard())
    }

    pub fn with_pipeline(
        config: IngestConfig,
        repository: Arc<dyn DocumentRepository>,
        storage: Arc<dyn SourceStorage>,
        parser: Arc<dyn StatementParser>,
        pipeline: IngestPipeline,
    ) -> Self {
        Self {
            config,
            repository,
            storage,
            parser,
            pipeline,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest the statement at `source_uri`.
    pub async fn ingest(
        &self,
        cancel: &CancellationToken,
        source_uri: &str,
    ) -> Result<IngestOutcome, PipelineError> {
        let mut state = PipelineState::new(
            source_uri,
            self.config.clone(),
            Arc::clone(&self.repository),
            Arc::clone(&self.storage),
            Arc::clone(&self.parser),
        );

        let outcome = self.pipeline.run(cancel, &mut state).await?;
        info!(
            source = %outcome.source_uri,
            document_id = %outcome.document_id,
            run_id = %outcome.run_id,
            reparse = outcome.reparse,
            transactions = outcome.transactions_persisted,
            "Ingestion complete"
        );
        Ok(outcome)
    }
}
