//! Bridges the job queue to the ingestion pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::service::IngestService;
use crate::queue::{JobError, JobHandler, ParseDocumentJob};

/// Job handler that ingests the job's source locator.
///
/// Structural and validation failures are reported as permanent so the
/// queue does not call the parsing service again for the same input.
pub struct PipelineJobHandler {
    service: Arc<IngestService>,
}

impl PipelineJobHandler {
    pub fn new(service: Arc<IngestService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler for PipelineJobHandler {
    async fn handle(
        &self,
        job: &ParseDocumentJob,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        match self.service.ingest(cancel, &job.source_uri).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let retryable = e.is_retryable();
                let error = anyhow::Error::new(e).context(format!("ingesting {}", job.source_uri));
                if retryable {
                    Err(JobError::Retryable(error))
                } else {
                    Err(JobError::Permanent(error))
                }
            }
        }
    }
}
