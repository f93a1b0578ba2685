//! Mock document repository for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::records::{
    CategoryRow, Document, DocumentStatus, ParsingRun, RawModelOutput, RunStatus, Transaction,
};
use crate::repository::{DocumentRepository, RepositoryError, TransactionBatch};

/// A persisted transaction for test assertions.
#[derive(Debug, Clone)]
pub struct StoredTransaction {
    pub batch: TransactionBatch,
    pub transaction: Transaction,
}

/// In-memory implementation of the DocumentRepository trait.
///
/// Provides controllable behavior for testing:
/// - Inspect documents, runs, raw output and transactions
/// - Seed the category taxonomy
/// - Make individual operations fail
///
/// # Example
///
/// ```rust,ignore
/// use ledgerline_core::testing::{fixtures, MockDocumentRepository};
///
/// let repo = MockDocumentRepository::new().with_categories(fixtures::taxonomy());
/// repo.fail_operation("insert_transactions", "disk full").await;
///
/// // Run the pipeline...
///
/// let runs = repo.runs().await;
/// assert_eq!(runs[0].error_message.as_deref(), Some("..."));
/// ```
#[derive(Debug, Default)]
pub struct MockDocumentRepository {
    documents: Arc<RwLock<Vec<Document>>>,
    runs: Arc<RwLock<Vec<ParsingRun>>>,
    raw_outputs: Arc<RwLock<Vec<RawModelOutput>>>,
    transactions: Arc<RwLock<Vec<StoredTransaction>>>,
    categories: Arc<RwLock<Vec<CategoryRow>>>,
    /// Operation name to the error message it fails with.
    failures: Arc<RwLock<HashMap<&'static str, String>>>,
}

impl MockDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the taxonomy returned by `list_active_categories`.
    pub fn with_categories(self, rows: Vec<CategoryRow>) -> Self {
        Self {
            categories: Arc::new(RwLock::new(rows)),
            ..self
        }
    }

    pub async fn add_category(&self, row: CategoryRow) {
        self.categories.write().await.push(row);
    }

    /// Make every call to `operation` fail with `message` until cleared.
    ///
    /// `operation` is the trait method name, e.g. `"insert_transactions"`.
    pub async fn fail_operation(&self, operation: &'static str, message: impl Into<String>) {
        self.failures.write().await.insert(operation, message.into());
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    pub async fn documents(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    pub async fn document(&self, id: &str) -> Option<Document> {
        self.documents.read().await.iter().find(|d| d.id == id).cloned()
    }

    /// All runs in the order they were started.
    pub async fn runs(&self) -> Vec<ParsingRun> {
        self.runs.read().await.clone()
    }

    pub async fn run(&self, id: &str) -> Option<ParsingRun> {
        self.runs.read().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn runs_for(&self, document_id: &str) -> Vec<ParsingRun> {
        self.runs
            .read()
            .await
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect()
    }

    pub async fn raw_outputs(&self) -> Vec<RawModelOutput> {
        self.raw_outputs.read().await.clone()
    }

    pub async fn transactions(&self) -> Vec<StoredTransaction> {
        self.transactions.read().await.clone()
    }

    pub async fn transaction_count(&self) -> usize {
        self.transactions.read().await.len()
    }

    async fn check(&self, operation: &'static str) -> Result<(), RepositoryError> {
        match self.failures.read().await.get(operation) {
            Some(message) => Err(RepositoryError::Database(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentRepository for MockDocumentRepository {
    async fn insert_document(&self, document: &Document) -> Result<(), RepositoryError> {
        self.check("insert_document").await?;
        let mut documents = self.documents.write().await;
        if documents.iter().any(|d| d.checksum == document.checksum) {
            return Err(RepositoryError::Database(format!(
                "duplicate checksum {}",
                document.checksum
            )));
        }
        documents.push(document.clone());
        Ok(())
    }

    async fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
    ) -> Result<(), RepositoryError> {
        self.check("update_document_status").await?;
        let mut documents = self.documents.write().await;
        let document = documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("document {}", document_id)))?;
        document.status = status;
        Ok(())
    }

    async fn find_document_by_checksum(
        &self,
        checksum: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        self.check("find_document_by_checksum").await?;
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .find(|d| d.checksum == checksum)
            .cloned())
    }

    async fn start_run(&self, run: &ParsingRun) -> Result<(), RepositoryError> {
        self.check("start_run").await?;
        self.runs.write().await.push(run.clone());
        Ok(())
    }

    async fn mark_run_failed(&self, run_id: &str, message: &str) {
        let mut runs = self.runs.write().await;
        if let Some(run) = runs.iter_mut().find(|r| r.id == run_id) {
            run.status = RunStatus::Failed;
            run.error_message = Some(message.to_string());
            run.completed_at = Some(Utc::now());
        }
    }

    async fn mark_run_succeeded(&self, run_id: &str) -> Result<(), RepositoryError> {
        self.check("mark_run_succeeded").await?;
        let mut runs = self.runs.write().await;
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("run {}", run_id)))?;
        run.status = RunStatus::Succeeded;
        run.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn supersede_runs(&self, document_id: &str) -> Result<usize, RepositoryError> {
        self.check("supersede_runs").await?;
        let mut runs = self.runs.write().await;
        let mut count = 0;
        for run in runs.iter_mut().filter(|r| r.document_id == document_id) {
            if !matches!(run.status, RunStatus::Running | RunStatus::Superseded) {
                run.status = RunStatus::Superseded;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn insert_raw_output(&self, output: &RawModelOutput) -> Result<(), RepositoryError> {
        self.check("insert_raw_output").await?;
        self.raw_outputs.write().await.push(output.clone());
        Ok(())
    }

    async fn insert_transactions(
        &self,
        batch: &TransactionBatch,
        transactions: &[Transaction],
    ) -> Result<usize, RepositoryError> {
        self.check("insert_transactions").await?;
        let mut stored = self.transactions.write().await;
        stored.extend(transactions.iter().map(|t| StoredTransaction {
            batch: batch.clone(),
            transaction: t.clone(),
        }));
        Ok(transactions.len())
    }

    async fn list_active_categories(&self) -> Result<Vec<CategoryRow>, RepositoryError> {
        self.check("list_active_categories").await?;
        Ok(self
            .categories
            .read()
            .await
            .iter()
            .filter(|c| c.active)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: &str, checksum: &str) -> Document {
        Document {
            id: id.to_string(),
            checksum: checksum.to_string(),
            filename: "a.pdf".to_string(),
            source_uri: "a.pdf".to_string(),
            owner_id: "default".to_string(),
            status: DocumentStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_checksum_rejected() {
        let repo = MockDocumentRepository::new();
        repo.insert_document(&document("d1", "abc")).await.unwrap();
        assert!(repo.insert_document(&document("d2", "abc")).await.is_err());
        assert_eq!(repo.documents().await.len(), 1);
    }

    #[tokio::test]
    async fn test_supersede_skips_running() {
        let repo = MockDocumentRepository::new();
        repo.start_run(&ParsingRun::start("r1", "d1", "m")).await.unwrap();
        repo.mark_run_failed("r1", "boom").await;
        repo.start_run(&ParsingRun::start("r2", "d1", "m")).await.unwrap();

        assert_eq!(repo.supersede_runs("d1").await.unwrap(), 1);
        assert_eq!(repo.run("r1").await.unwrap().status, RunStatus::Superseded);
        assert_eq!(repo.run("r2").await.unwrap().status, RunStatus::Running);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let repo = MockDocumentRepository::new();
        repo.fail_operation("start_run", "locked").await;

        let err = repo
            .start_run(&ParsingRun::start("r1", "d1", "m"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("locked"));

        repo.clear_failures().await;
        repo.start_run(&ParsingRun::start("r1", "d1", "m")).await.unwrap();
    }
}
