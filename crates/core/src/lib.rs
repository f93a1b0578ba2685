pub mod config;
pub mod ingest;
pub mod metrics;
pub mod parser;
pub mod queue;
pub mod records;
pub mod repository;
pub mod storage;
pub mod taxonomy;
pub mod testing;
pub mod transform;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use ingest::{
    IngestConfig, IngestOutcome, IngestPipeline, IngestService, PipelineError,
    PipelineJobHandler, PipelineState, Step, StepError,
};
pub use parser::{HttpStatementParser, ParserConfig, ParserError, StatementParser};
pub use queue::{
    InMemoryJobStore, JobError, JobFilter, JobHandler, JobQueue, JobStatus, JobStore,
    ParseDocumentJob, QueueConfig, QueueError, RetryDelay, TokioDelay,
};
pub use records::{
    CategoryRow, Direction, Document, DocumentStatus, ParsingRun, RawModelOutput, RunStatus,
    Transaction,
};
pub use repository::{DocumentRepository, RepositoryError, SqliteDocumentRepository};
pub use storage::{FsStorage, SourceStorage, StorageError};
pub use taxonomy::{CategoryValidator, ValidationError};
pub use transform::{transform_output, TransformError};
