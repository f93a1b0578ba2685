mod metrics;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ledgerline_core::{
    load_config, storage::filename_from_locator, validate_config, DocumentRepository, FsStorage,
    HttpStatementParser, InMemoryJobStore, IngestService, JobFilter, JobQueue, JobStatus,
    ParseDocumentJob, PipelineJobHandler, SanitizedConfig, SourceStorage, SqliteDocumentRepository,
    StatementParser, TokioDelay,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long in-flight jobs get to finish on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// How often job progress is checked while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("LEDGERLINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("ledgerline.toml"));

    // Load configuration
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(config.logging.json);
    info!(version = VERSION, "Starting ledgerline worker");

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded from {:?}", config_path);
    debug!(
        config = %serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default(),
        "Effective configuration"
    );

    let locators: Vec<String> = std::env::args().skip(1).collect();
    if locators.is_empty() {
        warn!("No statement locators given, nothing to do");
        return Ok(());
    }

    // Create SQLite document repository
    let repository: Arc<dyn DocumentRepository> = Arc::new(
        SqliteDocumentRepository::new(&config.database.path)
            .context("Failed to open document repository")?,
    );
    info!("Document repository at {:?}", config.database.path);

    // Create source storage
    let storage: Arc<dyn SourceStorage> = Arc::new(match &config.storage.root {
        Some(root) => FsStorage::new().with_root(root),
        None => FsStorage::new(),
    });

    // Create parser client
    let parser: Arc<dyn StatementParser> = Arc::new(
        HttpStatementParser::new(config.parser.clone())
            .context("Failed to create statement parser")?,
    );
    info!(
        endpoint = %config.parser.endpoint,
        model = %parser.model(),
        "Statement parser initialized"
    );

    let service = Arc::new(IngestService::new(
        config.ingest.clone(),
        repository,
        storage,
        parser,
    ));

    // Start the worker pool
    let shutdown = CancellationToken::new();
    let handler = PipelineJobHandler::new(service);
    let queue = JobQueue::new(
        config.queue.clone(),
        Arc::new(InMemoryJobStore::new()),
        Arc::new(TokioDelay),
    );
    queue.start(Arc::new(handler)).await?;

    let mut job_ids = Vec::with_capacity(locators.len());
    for locator in &locators {
        let job = ParseDocumentJob::new(filename_from_locator(locator), locator.as_str());
        tokio::select! {
            enqueued = queue.enqueue(&shutdown, job) => {
                let job = enqueued.with_context(|| format!("Failed to enqueue {}", locator))?;
                info!(job_id = %job.id, source = %locator, "Queued statement");
                job_ids.push(job.id);
            }
            _ = shutdown_signal() => {
                warn!("Shutdown requested while enqueuing");
                shutdown.cancel();
                break;
            }
        }
    }

    // Wait for every job to finish, or for a shutdown signal
    if !shutdown.is_cancelled() {
        tokio::select! {
            _ = wait_for_jobs(&queue, &job_ids) => {}
            _ = shutdown_signal() => {
                info!("Shutdown signal received");
            }
        }
    }

    // Runs still in flight after the grace period are cancelled by the queue
    // and marked failed by the pipeline.
    if let Err(e) = queue.stop(SHUTDOWN_GRACE).await {
        warn!("Worker pool did not stop cleanly: {}", e);
    }

    debug!(metrics = %metrics::encode_metrics(), "Final metrics");
    report(&queue)
}

/// Poll the job store until all `job_ids` reach a terminal status.
async fn wait_for_jobs(queue: &JobQueue, job_ids: &[String]) {
    loop {
        let finished = job_ids.iter().all(|id| {
            matches!(
                queue.get_job(id),
                Ok(Some(job)) if job.status.is_terminal()
            )
        });
        if finished {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Log the outcome of every job; fail if any did not complete.
fn report(queue: &JobQueue) -> Result<()> {
    let jobs = queue.list_jobs(&JobFilter::new())?;
    let mut unfinished = 0;

    for job in &jobs {
        match job.status {
            JobStatus::Completed => {
                info!(job_id = %job.id, source = %job.source_uri, "Ingested");
            }
            status => {
                unfinished += 1;
                error!(
                    job_id = %job.id,
                    source = %job.source_uri,
                    status = %status,
                    attempts = job.retry_count,
                    error = job.error.as_deref().unwrap_or(""),
                    "Not ingested"
                );
            }
        }
    }

    info!(
        total = jobs.len(),
        completed = jobs.len() - unfinished,
        "Ledgerline worker finished"
    );
    if unfinished > 0 {
        bail!("{} of {} statement(s) were not ingested", unfinished, jobs.len());
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
