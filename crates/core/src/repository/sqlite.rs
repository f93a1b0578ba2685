//! SQLite-backed document repository.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{error, warn};

use super::{DocumentRepository, RepositoryError, TransactionBatch};
use crate::records::{
    CategoryRow, Document, DocumentStatus, ParsingRun, RawModelOutput, RunStatus, Transaction,
};

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl SqliteDocumentRepository {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory repository (useful for testing).
    pub fn in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RepositoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                checksum TEXT NOT NULL UNIQUE,
                filename TEXT NOT NULL,
                source_uri TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS parsing_runs (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id),
                status TEXT NOT NULL,
                model TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                error_message TEXT
            );

            CREATE TABLE IF NOT EXISTS raw_outputs (
                run_id TEXT NOT NULL REFERENCES parsing_runs(id),
                document_id TEXT NOT NULL REFERENCES documents(id),
                output TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                parent_id TEXT REFERENCES categories(id),
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id),
                run_id TEXT NOT NULL REFERENCES parsing_runs(id),
                owner_id TEXT NOT NULL,
                date TEXT NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                balance_after REAL,
                account_name TEXT,
                account_number TEXT,
                category TEXT NOT NULL,
                subcategory TEXT NOT NULL,
                category_id TEXT REFERENCES categories(id)
            );

            CREATE INDEX IF NOT EXISTS idx_runs_document ON parsing_runs(document_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_document ON transactions(document_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_run ON transactions(run_id);
            "#,
        )
        .map_err(db_err)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
        let status: String = row.get(5)?;
        let created_at: String = row.get(6)?;
        Ok(Document {
            id: row.get(0)?,
            checksum: row.get(1)?,
            filename: row.get(2)?,
            source_uri: row.get(3)?,
            owner_id: row.get(4)?,
            status: DocumentStatus::parse(&status).unwrap_or(DocumentStatus::Pending),
            created_at: parse_timestamp(&created_at),
        })
    }

    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<ParsingRun> {
        let status: String = row.get(2)?;
        let started_at: String = row.get(4)?;
        let completed_at: Option<String> = row.get(5)?;
        Ok(ParsingRun {
            id: row.get(0)?,
            document_id: row.get(1)?,
            status: RunStatus::parse(&status).unwrap_or(RunStatus::Failed),
            model: row.get(3)?,
            started_at: parse_timestamp(&started_at),
            completed_at: completed_at.as_deref().map(parse_timestamp),
            error_message: row.get(6)?,
        })
    }

    /// Insert a taxonomy row.
    pub fn insert_category(&self, row: &CategoryRow) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (id, name, parent_id, active) VALUES (?, ?, ?, ?)",
            params![row.id, row.name, row.parent_id, row.active],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Get a parsing run by ID.
    pub fn get_run(&self, run_id: &str) -> Result<Option<ParsingRun>, RepositoryError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, document_id, status, model, started_at, completed_at, error_message FROM parsing_runs WHERE id = ?",
            params![run_id],
            Self::row_to_run,
        )
        .optional()
        .map_err(db_err)
    }

    /// List all runs of a document, oldest first.
    pub fn list_runs(&self, document_id: &str) -> Result<Vec<ParsingRun>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, document_id, status, model, started_at, completed_at, error_message FROM parsing_runs WHERE document_id = ? ORDER BY started_at ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![document_id], Self::row_to_run)
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    /// Count the transactions persisted for a document.
    pub fn count_transactions(&self, document_id: &str) -> Result<i64, RepositoryError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE document_id = ?",
            params![document_id],
            |row| row.get(0),
        )
        .map_err(db_err)
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn insert_document(&self, document: &Document) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents (id, checksum, filename, source_uri, owner_id, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                document.id,
                document.checksum,
                document.filename,
                document.source_uri,
                document.owner_id,
                document.status.as_str(),
                document.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
    ) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE documents SET status = ? WHERE id = ?",
                params![status.as_str(), document_id],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(document_id.to_string()));
        }
        Ok(())
    }

    async fn find_document_by_checksum(
        &self,
        checksum: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, checksum, filename, source_uri, owner_id, status, created_at FROM documents WHERE checksum = ?",
            params![checksum],
            Self::row_to_document,
        )
        .optional()
        .map_err(db_err)
    }

    async fn start_run(&self, run: &ParsingRun) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO parsing_runs (id, document_id, status, model, started_at, completed_at, error_message) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                run.id,
                run.document_id,
                run.status.as_str(),
                run.model,
                run.started_at.to_rfc3339(),
                run.completed_at.map(|t| t.to_rfc3339()),
                run.error_message,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn mark_run_failed(&self, run_id: &str, message: &str) {
        let conn = match self.conn() {
            Ok(conn) => conn,
            Err(e) => {
                error!(run_id = %run_id, "Failed to mark run failed: {}", e);
                return;
            }
        };

        match conn.execute(
            "UPDATE parsing_runs SET status = ?, error_message = ?, completed_at = ? WHERE id = ?",
            params![
                RunStatus::Failed.as_str(),
                message,
                Utc::now().to_rfc3339(),
                run_id
            ],
        ) {
            Ok(0) => warn!(run_id = %run_id, "Mark run failed: run not found"),
            Ok(_) => {}
            Err(e) => error!(run_id = %run_id, "Failed to mark run failed: {}", e),
        }
    }

    async fn mark_run_succeeded(&self, run_id: &str) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE parsing_runs SET status = ?, error_message = NULL, completed_at = ? WHERE id = ?",
                params![
                    RunStatus::Succeeded.as_str(),
                    Utc::now().to_rfc3339(),
                    run_id
                ],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(RepositoryError::NotFound(run_id.to_string()));
        }
        Ok(())
    }

    async fn supersede_runs(&self, document_id: &str) -> Result<usize, RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE parsing_runs SET status = ? WHERE document_id = ? AND status NOT IN (?, ?)",
            params![
                RunStatus::Superseded.as_str(),
                document_id,
                RunStatus::Running.as_str(),
                RunStatus::Superseded.as_str(),
            ],
        )
        .map_err(db_err)
    }

    async fn insert_raw_output(&self, output: &RawModelOutput) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(&output.output)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO raw_outputs (run_id, document_id, output, created_at) VALUES (?, ?, ?, ?)",
            params![
                output.run_id,
                output.document_id,
                json,
                output.created_at.to_rfc3339()
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_transactions(
        &self,
        batch: &TransactionBatch,
        transactions: &[Transaction],
    ) -> Result<usize, RepositoryError> {
        if transactions.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO transactions (id, document_id, run_id, owner_id, date, description, amount, currency, balance_after, account_name, account_number, category, subcategory, category_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(db_err)?;
            for txn in transactions {
                stmt.execute(params![
                    uuid::Uuid::new_v4().to_string(),
                    batch.document_id,
                    batch.run_id,
                    batch.owner_id,
                    txn.date.to_string(),
                    txn.description,
                    txn.amount,
                    txn.currency,
                    txn.balance_after,
                    txn.account_name,
                    txn.account_number,
                    txn.category,
                    txn.subcategory,
                    txn.category_id,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        Ok(transactions.len())
    }

    async fn list_active_categories(&self) -> Result<Vec<CategoryRow>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, parent_id, active FROM categories WHERE active = 1 ORDER BY name")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CategoryRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    parent_id: row.get(2)?,
                    active: row.get(3)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn create_test_repo() -> SqliteDocumentRepository {
        SqliteDocumentRepository::in_memory().unwrap()
    }

    fn document(id: &str, checksum: &str) -> Document {
        Document {
            id: id.to_string(),
            checksum: checksum.to_string(),
            filename: "statement.pdf".to_string(),
            source_uri: "file:///tmp/statement.pdf".to_string(),
            owner_id: "owner-1".to_string(),
            status: DocumentStatus::Pending,
            created_at: Utc::now(),
        }
    }

    fn transaction() -> Transaction {
        Transaction {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            description: "Coffee".to_string(),
            amount: -3.5,
            currency: "GBP".to_string(),
            balance_after: Some(100.0),
            account_name: None,
            account_number: None,
            category: "Food & Dining".to_string(),
            subcategory: "Cafes".to_string(),
            category_id: Some("cat-food".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_document() {
        let repo = create_test_repo();
        repo.insert_document(&document("doc-1", "abc")).await.unwrap();

        let found = repo.find_document_by_checksum("abc").await.unwrap().unwrap();
        assert_eq!(found.id, "doc-1");
        assert_eq!(found.status, DocumentStatus::Pending);

        assert!(repo.find_document_by_checksum("zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_checksum_rejected() {
        let repo = create_test_repo();
        repo.insert_document(&document("doc-1", "abc")).await.unwrap();
        let result = repo.insert_document(&document("doc-2", "abc")).await;
        assert!(matches!(result, Err(RepositoryError::Database(_))));
    }

    #[tokio::test]
    async fn test_run_lifecycle() {
        let repo = create_test_repo();
        repo.insert_document(&document("doc-1", "abc")).await.unwrap();
        repo.start_run(&ParsingRun::start("run-1", "doc-1", "model-x"))
            .await
            .unwrap();

        repo.mark_run_succeeded("run-1").await.unwrap();
        let run = repo.get_run("run-1").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert!(run.completed_at.is_some());

        repo.mark_run_failed("run-1", "boom").await;
        let run = repo.get_run("run-1").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_mark_unknown_run_failed_does_not_error() {
        let repo = create_test_repo();
        repo.mark_run_failed("missing", "boom").await;
        assert!(matches!(
            repo.mark_run_succeeded("missing").await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_supersede_skips_running() {
        let repo = create_test_repo();
        repo.insert_document(&document("doc-1", "abc")).await.unwrap();
        for id in ["run-1", "run-2", "run-3"] {
            repo.start_run(&ParsingRun::start(id, "doc-1", "model-x"))
                .await
                .unwrap();
        }
        repo.mark_run_failed("run-1", "boom").await;
        repo.mark_run_succeeded("run-2").await.unwrap();

        let affected = repo.supersede_runs("doc-1").await.unwrap();
        assert_eq!(affected, 2);

        assert_eq!(repo.get_run("run-1").unwrap().unwrap().status, RunStatus::Superseded);
        assert_eq!(repo.get_run("run-2").unwrap().unwrap().status, RunStatus::Superseded);
        assert_eq!(repo.get_run("run-3").unwrap().unwrap().status, RunStatus::Running);
        assert_eq!(repo.list_runs("doc-1").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_insert_transactions() {
        let repo = create_test_repo();
        repo.insert_document(&document("doc-1", "abc")).await.unwrap();
        repo.start_run(&ParsingRun::start("run-1", "doc-1", "model-x"))
            .await
            .unwrap();
        repo.insert_category(&CategoryRow::category("cat-food", "Food & Dining"))
            .unwrap();

        let batch = TransactionBatch {
            document_id: "doc-1".to_string(),
            run_id: "run-1".to_string(),
            owner_id: "owner-1".to_string(),
        };
        let inserted = repo
            .insert_transactions(&batch, &[transaction(), transaction()])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(repo.count_transactions("doc-1").unwrap(), 2);

        assert_eq!(repo.insert_transactions(&batch, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_raw_output_roundtrip_storage() {
        let repo = create_test_repo();
        repo.insert_document(&document("doc-1", "abc")).await.unwrap();
        repo.start_run(&ParsingRun::start("run-1", "doc-1", "model-x"))
            .await
            .unwrap();
        let output = RawModelOutput {
            run_id: "run-1".to_string(),
            document_id: "doc-1".to_string(),
            output: serde_json::json!({ "transactions": [] }),
            created_at: Utc::now(),
        };
        repo.insert_raw_output(&output).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_active_categories() {
        let repo = create_test_repo();
        repo.insert_category(&CategoryRow::category("cat-food", "Food & Dining"))
            .unwrap();
        repo.insert_category(&CategoryRow::subcategory("sub-cafes", "cat-food", "Cafes"))
            .unwrap();
        repo.insert_category(&CategoryRow {
            active: false,
            ..CategoryRow::category("cat-old", "Legacy")
        })
        .unwrap();

        let rows = repo.list_active_categories().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.active));
        assert!(rows
            .iter()
            .any(|r| r.parent_id.as_deref() == Some("cat-food")));
    }

    #[tokio::test]
    async fn test_update_document_status() {
        let repo = create_test_repo();
        repo.insert_document(&document("doc-1", "abc")).await.unwrap();
        repo.update_document_status("doc-1", DocumentStatus::Processed)
            .await
            .unwrap();
        let doc = repo.find_document_by_checksum("abc").await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Processed);

        assert!(matches!(
            repo.update_document_status("missing", DocumentStatus::Failed).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_backed_repository() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let repo = SqliteDocumentRepository::new(&path).unwrap();
            repo.insert_category(&CategoryRow::category("cat-1", "Housing"))
                .unwrap();
        }
        // Reopening keeps data and tolerates the existing schema.
        let repo = SqliteDocumentRepository::new(&path).unwrap();
        let rows = tokio_test::block_on(repo.list_active_categories()).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
