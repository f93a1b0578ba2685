//! Document repository: documents, parsing runs, raw output, transactions
//! and the category taxonomy.

mod sqlite;
mod traits;

pub use sqlite::SqliteDocumentRepository;
pub use traits::{DocumentRepository, RepositoryError, TransactionBatch};
