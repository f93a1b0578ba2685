//! Steps of the standard ingestion pipeline.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::engine::Step;
use super::error::{CategoryFailure, StepError, ValidationReport};
use super::state::PipelineState;
use crate::metrics::TRANSACTIONS_PERSISTED;
use crate::records::{Document, DocumentStatus, ParsingRun, RawModelOutput};
use crate::repository::TransactionBatch;
use crate::taxonomy::CategoryValidator;
use crate::transform::transform_output;

/// Marks the open run failed with the error text, then hands the error back.
async fn fail(state: &PipelineState, error: StepError) -> StepError {
    state.fail_run(&error.to_string()).await;
    error
}

/// Downloads the raw source bytes.
pub struct FetchSource;

#[async_trait]
impl Step for FetchSource {
    fn name(&self) -> &'static str {
        "fetch_source"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        match state.storage.fetch(&state.source_uri).await {
            Ok(content) => {
                debug!(source = %state.source_uri, bytes = content.len(), "Fetched source");
                state.content = content;
                Ok(())
            }
            Err(e) => Err(fail(state, e.into()).await),
        }
    }
}

/// Fingerprints the content with SHA-256.
pub struct ComputeChecksum;

#[async_trait]
impl Step for ComputeChecksum {
    fn name(&self) -> &'static str {
        "compute_checksum"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        if state.content.is_empty() {
            return Err(StepError::EmptyContent);
        }
        state.checksum = Some(format!("{:x}", Sha256::digest(&state.content)));
        Ok(())
    }
}

/// Reuses the document with the same checksum or registers a new one.
pub struct ResolveDocument;

#[async_trait]
impl Step for ResolveDocument {
    fn name(&self) -> &'static str {
        "resolve_document"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        let checksum = state.checksum()?.to_string();

        if let Some(existing) = state.repository.find_document_by_checksum(&checksum).await? {
            info!(document_id = %existing.id, "Content already ingested, re-parsing");
            state.document_id = Some(existing.id);
            state.reparse = true;
            return Ok(());
        }

        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            checksum: checksum.clone(),
            filename: state.storage.filename(&state.source_uri),
            source_uri: state.source_uri.clone(),
            owner_id: state.config.owner_id.clone(),
            status: DocumentStatus::Pending,
            created_at: Utc::now(),
        };

        if let Err(e) = state.repository.insert_document(&document).await {
            // A concurrent run may have registered the same content first.
            return match state.repository.find_document_by_checksum(&checksum).await {
                Ok(Some(existing)) => {
                    info!(document_id = %existing.id, "Document registered concurrently, re-parsing");
                    state.document_id = Some(existing.id);
                    state.reparse = true;
                    Ok(())
                }
                _ => Err(e.into()),
            };
        }

        info!(document_id = %document.id, filename = %document.filename, "Registered new document");
        state.document_id = Some(document.id);
        state.reparse = false;
        Ok(())
    }
}

/// Supersedes earlier finished runs when the document is being re-parsed.
pub struct SupersedeOldRuns;

#[async_trait]
impl Step for SupersedeOldRuns {
    fn name(&self) -> &'static str {
        "supersede_old_runs"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        if !state.reparse {
            return Ok(());
        }
        let document_id = state.document_id()?;
        let superseded = state.repository.supersede_runs(document_id).await?;
        debug!(document_id = %document_id, superseded, "Superseded previous runs");
        Ok(())
    }
}

/// Opens a new parsing run in the running state.
pub struct StartParsingRun;

#[async_trait]
impl Step for StartParsingRun {
    fn name(&self) -> &'static str {
        "start_parsing_run"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        let run = ParsingRun::start(
            uuid::Uuid::new_v4().to_string(),
            state.document_id()?,
            state.parser.model(),
        );
        state.repository.start_run(&run).await?;
        info!(run_id = %run.id, document_id = %run.document_id, model = %run.model, "Started parsing run");
        state.run_id = Some(run.id);
        Ok(())
    }
}

/// Sends the content to the external parsing service.
pub struct ParseWithAiService;

#[async_trait]
impl Step for ParseWithAiService {
    fn name(&self) -> &'static str {
        "parse_with_ai_service"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        let limit = state.config.parse_timeout();
        let result = tokio::time::timeout(limit, state.parser.parse(&state.content)).await;

        match result {
            Ok(Ok(output)) => {
                state.raw_output = Some(output);
                Ok(())
            }
            Ok(Err(e)) => Err(fail(state, e.into()).await),
            Err(_) => Err(fail(state, StepError::ParseTimeout(limit)).await),
        }
    }
}

/// Persists the unmodified parser output before it is interpreted.
pub struct StoreRawOutput;

#[async_trait]
impl Step for StoreRawOutput {
    fn name(&self) -> &'static str {
        "store_raw_output"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        let output = RawModelOutput {
            run_id: state.run_id()?.to_string(),
            document_id: state.document_id()?.to_string(),
            output: state
                .raw_output
                .clone()
                .ok_or(StepError::MissingState("raw output"))?,
            created_at: Utc::now(),
        };

        if let Err(e) = state.repository.insert_raw_output(&output).await {
            return Err(fail(state, e.into()).await);
        }
        Ok(())
    }
}

/// Converts the parser output into typed transactions.
pub struct TransformOutput;

#[async_trait]
impl Step for TransformOutput {
    fn name(&self) -> &'static str {
        "transform_output"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        let raw = state
            .raw_output
            .as_ref()
            .ok_or(StepError::MissingState("raw output"))?;

        match transform_output(raw) {
            Ok(transactions) => {
                debug!(count = transactions.len(), "Transformed parser output");
                state.transactions = transactions;
                Ok(())
            }
            Err(e) => Err(fail(state, e.into()).await),
        }
    }
}

/// Builds the category validator from the active taxonomy.
pub struct BuildValidator;

#[async_trait]
impl Step for BuildValidator {
    fn name(&self) -> &'static str {
        "build_validator"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        let rows = match state.repository.list_active_categories().await {
            Ok(rows) => rows,
            Err(e) => return Err(fail(state, e.into()).await),
        };

        let validator = CategoryValidator::new(&rows);
        if validator.is_empty() {
            warn!("Category taxonomy is empty; every transaction will fail validation");
        }
        state.validator = Some(validator);
        Ok(())
    }
}

/// Validates every transaction's category pair, reporting all failures.
pub struct ValidateCategories;

#[async_trait]
impl Step for ValidateCategories {
    fn name(&self) -> &'static str {
        "validate_categories"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        let validator = state
            .validator
            .as_ref()
            .ok_or(StepError::MissingState("category validator"))?;

        let mut resolved = Vec::with_capacity(state.transactions.len());
        let mut report = ValidationReport::default();

        for (index, txn) in state.transactions.iter().enumerate() {
            match validator.validate(&txn.category, &txn.subcategory) {
                Ok(category_id) => resolved.push(category_id),
                Err(error) => report.failures.push(CategoryFailure {
                    index,
                    date: txn.date,
                    description: txn.description.clone(),
                    error,
                }),
            }
        }

        if !report.is_empty() {
            return Err(fail(state, StepError::CategoryValidation(report)).await);
        }

        for (txn, category_id) in state.transactions.iter_mut().zip(resolved) {
            txn.category_id = Some(category_id);
        }
        Ok(())
    }
}

/// Bulk-inserts the validated transactions.
pub struct PersistTransactions;

#[async_trait]
impl Step for PersistTransactions {
    fn name(&self) -> &'static str {
        "persist_transactions"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        if state.transactions.is_empty() {
            debug!("No transactions to persist");
            return Ok(());
        }

        let batch = TransactionBatch {
            document_id: state.document_id()?.to_string(),
            run_id: state.run_id()?.to_string(),
            owner_id: state.config.owner_id.clone(),
        };

        match state
            .repository
            .insert_transactions(&batch, &state.transactions)
            .await
        {
            Ok(count) => {
                TRANSACTIONS_PERSISTED.inc_by(count as u64);
                state.transactions_persisted = count;
                Ok(())
            }
            Err(e) => Err(fail(state, e.into()).await),
        }
    }
}

/// Flips the run to succeeded and the document to processed.
pub struct MarkRunSucceeded;

#[async_trait]
impl Step for MarkRunSucceeded {
    fn name(&self) -> &'static str {
        "mark_run_succeeded"
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), StepError> {
        let run_id = state.run_id()?;
        let document_id = state.document_id()?;

        // Document first: once the run reads succeeded nothing may fail.
        if let Err(e) = state
            .repository
            .update_document_status(document_id, DocumentStatus::Processed)
            .await
        {
            return Err(fail(state, e.into()).await);
        }
        if let Err(e) = state.repository.mark_run_succeeded(run_id).await {
            return Err(fail(state, e.into()).await);
        }

        info!(
            run_id = %run_id,
            document_id = %document_id,
            transactions = state.transactions_persisted,
            "Parsing run succeeded"
        );
        Ok(())
    }
}
