//! Mutable state threaded through one ingestion run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::config::IngestConfig;
use super::error::StepError;
use crate::parser::StatementParser;
use crate::records::Transaction;
use crate::repository::DocumentRepository;
use crate::storage::SourceStorage;
use crate::taxonomy::CategoryValidator;

/// Upper bound on error text stored on a failed run.
pub const MAX_FAILURE_MESSAGE_CHARS: usize = 1000;

/// Shortens `message` to at most `max_chars` characters, marking the cut.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// State of one ingestion run. Created per invocation, dropped afterwards.
pub struct PipelineState {
    pub source_uri: String,
    pub document_id: Option<String>,
    pub run_id: Option<String>,
    pub content: Vec<u8>,
    pub checksum: Option<String>,
    pub raw_output: Option<serde_json::Value>,
    pub transactions: Vec<Transaction>,
    /// True when the content matched an existing document.
    pub reparse: bool,
    pub validator: Option<CategoryValidator>,
    pub transactions_persisted: usize,

    pub config: IngestConfig,
    pub repository: Arc<dyn DocumentRepository>,
    pub storage: Arc<dyn SourceStorage>,
    pub parser: Arc<dyn StatementParser>,
}

impl PipelineState {
    pub fn new(
        source_uri: impl Into<String>,
        config: IngestConfig,
        repository: Arc<dyn DocumentRepository>,
        storage: Arc<dyn SourceStorage>,
        parser: Arc<dyn StatementParser>,
    ) -> Self {
        Self {
            source_uri: source_uri.into(),
            document_id: None,
            run_id: None,
            content: Vec::new(),
            checksum: None,
            raw_output: None,
            transactions: Vec::new(),
            reparse: false,
            validator: None,
            transactions_persisted: 0,
            config,
            repository,
            storage,
            parser,
        }
    }

    pub fn document_id(&self) -> Result<&str, StepError> {
        self.document_id
            .as_deref()
            .ok_or(StepError::MissingState("document id"))
    }

    pub fn run_id(&self) -> Result<&str, StepError> {
        self.run_id.as_deref().ok_or(StepError::MissingState("run id"))
    }

    pub fn checksum(&self) -> Result<&str, StepError> {
        self.checksum
            .as_deref()
            .ok_or(StepError::MissingState("checksum"))
    }

    /// Marks the open run failed, if one is open. Never fails.
    pub async fn fail_run(&self, message: &str) {
        if let Some(run_id) = &self.run_id {
            let message = truncate_message(message, MAX_FAILURE_MESSAGE_CHARS);
            self.repository.mark_run_failed(run_id, &message).await;
        }
    }

    /// Summary of a finished run.
    pub fn outcome(&self) -> IngestOutcome {
        IngestOutcome {
            source_uri: self.source_uri.clone(),
            document_id: self.document_id.clone().unwrap_or_default(),
            run_id: self.run_id.clone().unwrap_or_default(),
            checksum: self.checksum.clone().unwrap_or_default(),
            reparse: self.reparse,
            transactions_persisted: self.transactions_persisted,
        }
    }
}

/// Result of a successful ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub source_uri: String,
    pub document_id: String,
    pub run_id: String,
    pub checksum: String,
    pub reparse: bool,
    pub transactions_persisted: usize,
}
