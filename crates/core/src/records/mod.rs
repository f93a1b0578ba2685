//! Durable records shared by the ingestion pipeline and its repository.

mod types;

pub use types::{
    CategoryRow, Direction, Document, DocumentStatus, ParsingRun, RawModelOutput, RunStatus,
    Transaction,
};
