//! Document repository trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::records::{
    CategoryRow, Document, DocumentStatus, ParsingRun, RawModelOutput, Transaction,
};

/// Error type for repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Identifies which document and run a batch of transactions belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBatch {
    pub document_id: String,
    pub run_id: String,
    pub owner_id: String,
}

/// Persistence for documents, parsing runs, raw output, transactions and
/// the category taxonomy.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document record.
    async fn insert_document(&self, document: &Document) -> Result<(), RepositoryError>;

    /// Update a document's processing status.
    async fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
    ) -> Result<(), RepositoryError>;

    /// Find a document by content checksum.
    async fn find_document_by_checksum(
        &self,
        checksum: &str,
    ) -> Result<Option<Document>, RepositoryError>;

    /// Open a parsing run.
    async fn start_run(&self, run: &ParsingRun) -> Result<(), RepositoryError>;

    /// Mark a run failed with the given message.
    ///
    /// Runs on paths that are already failing, so it never returns an error;
    /// problems are logged by the implementation.
    async fn mark_run_failed(&self, run_id: &str, message: &str);

    /// Mark a run succeeded and stamp its completion time.
    async fn mark_run_succeeded(&self, run_id: &str) -> Result<(), RepositoryError>;

    /// Mark every non-running run of a document as superseded.
    ///
    /// Returns the number of runs affected.
    async fn supersede_runs(&self, document_id: &str) -> Result<usize, RepositoryError>;

    /// Persist the unmodified parser output.
    async fn insert_raw_output(&self, output: &RawModelOutput) -> Result<(), RepositoryError>;

    /// Bulk-insert validated transactions.
    async fn insert_transactions(
        &self,
        batch: &TransactionBatch,
        transactions: &[Transaction],
    ) -> Result<usize, RepositoryError>;

    /// List the active taxonomy rows.
    async fn list_active_categories(&self) -> Result<Vec<CategoryRow>, RepositoryError>;
}
