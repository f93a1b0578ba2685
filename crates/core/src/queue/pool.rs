//! Bounded job queue drained by a fixed pool of workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::QueueConfig;
use super::delay::RetryDelay;
use super::error::QueueError;
use super::handler::JobHandler;
use super::store::JobStore;
use super::types::{JobFilter, JobStatus, ParseDocumentJob};
use crate::metrics::{JOBS, JOBS_IN_FLIGHT};

type JobSender = Arc<Mutex<Option<mpsc::Sender<ParseDocumentJob>>>>;

/// How long cancelled handlers get to wind down once the shutdown grace
/// period has elapsed. Workers still running after that are aborted.
const CANCEL_DRAIN: Duration = Duration::from_secs(5);

/// Error recorded on jobs that never ran because the queue shut down.
const QUEUE_CLOSED: &str = "queue closed";

/// In-process queue of parse jobs.
///
/// Jobs are persisted to the [`JobStore`] before they enter the channel, and
/// every status change is written back, so the store always reflects each
/// job's last known state.
pub struct JobQueue {
    config: QueueConfig,
    store: Arc<dyn JobStore>,
    delay: Arc<dyn RetryDelay>,

    /// `None` once the queue is closed.
    sender: JobSender,
    receiver: Arc<Mutex<mpsc::Receiver<ParseDocumentJob>>>,
    /// Stops workers from taking new jobs.
    stop_token: CancellationToken,
    /// Aborts in-flight jobs.
    run_token: CancellationToken,
    started: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Everything a worker task needs, shared between all of them.
struct WorkerContext {
    config: QueueConfig,
    store: Arc<dyn JobStore>,
    delay: Arc<dyn RetryDelay>,
    handler: Arc<dyn JobHandler>,
    sender: JobSender,
    receiver: Arc<Mutex<mpsc::Receiver<ParseDocumentJob>>>,
    stop_token: CancellationToken,
    run_token: CancellationToken,
}

impl JobQueue {
    pub fn new(config: QueueConfig, store: Arc<dyn JobStore>, delay: Arc<dyn RetryDelay>) -> Self {
        let (tx, rx) = mpsc::channel(config.buffer_size.max(1));
        Self {
            config,
            store,
            delay,
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: Arc::new(Mutex::new(rx)),
            stop_token: CancellationToken::new(),
            run_token: CancellationToken::new(),
            started: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Persist `job` as pending and hand it to the workers.
    ///
    /// Waits while the buffer is full. Returns [`QueueError::Cancelled`] if
    /// `cancel` fires first, or [`QueueError::QueueClosed`] if the queue shuts
    /// down first; either way the stored job is marked failed.
    pub async fn enqueue(
        &self,
        cancel: &CancellationToken,
        mut job: ParseDocumentJob,
    ) -> Result<ParseDocumentJob, QueueError> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or(QueueError::QueueClosed)?;

        if job.id.is_empty() {
            job.id = uuid::Uuid::new_v4().to_string();
        }
        if job.created_at.is_none() {
            job.created_at = Some(Utc::now());
        }
        if job.max_retries == 0 {
            job.max_retries = self.config.max_retries;
        }
        job.status = JobStatus::Pending;
        self.store.save(&job)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(job_id = %job.id, "Enqueue cancelled while waiting for buffer space");
                self.abandon(job, "enqueue cancelled");
                Err(QueueError::Cancelled)
            }
            _ = self.stop_token.cancelled() => {
                warn!(job_id = %job.id, "Queue closed while waiting for buffer space");
                self.abandon(job, QUEUE_CLOSED);
                Err(QueueError::QueueClosed)
            }
            sent = sender.send(job.clone()) => {
                sent.map_err(|_| QueueError::QueueClosed)?;
                JOBS.with_label_values(&["enqueued"]).inc();
                debug!(job_id = %job.id, document_id = %job.document_id, "Job enqueued");
                Ok(job)
            }
        }
    }

    /// Spawn the worker pool.
    pub async fn start(&self, handler: Arc<dyn JobHandler>) -> Result<(), QueueError> {
        if self.sender.lock().await.is_none() {
            return Err(QueueError::QueueClosed);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(QueueError::AlreadyStarted);
        }

        let ctx = Arc::new(WorkerContext {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            delay: Arc::clone(&self.delay),
            handler,
            sender: Arc::clone(&self.sender),
            receiver: Arc::clone(&self.receiver),
            stop_token: self.stop_token.clone(),
            run_token: self.run_token.clone(),
        });

        let count = self.config.workers.max(1);
        let mut workers = self.workers.lock().await;
        for worker_id in 0..count {
            let ctx = Arc::clone(&ctx);
            workers.push(tokio::spawn(async move { worker_loop(worker_id, ctx).await }));
        }

        info!(workers = count, buffer = self.config.buffer_size, "Job queue started");
        Ok(())
    }

    /// Stop taking work and wait up to `grace` for in-flight jobs.
    ///
    /// When the grace period elapses, handlers are cancelled and given a
    /// short window to record their own failure, then
    /// [`QueueError::ShutdownTimeout`] is returned. The stored status of
    /// abandoned jobs is left as last persisted. Jobs still buffered are
    /// marked failed with "queue closed".
    pub async fn stop(&self, grace: Duration) -> Result<(), QueueError> {
        self.shutdown(Some(grace)).await
    }

    /// Stop and wait for in-flight jobs with no deadline. Safe to call more
    /// than once.
    pub async fn close(&self) {
        // Without a deadline the only possible outcome is Ok.
        let _ = self.shutdown(None).await;
    }

    async fn shutdown(&self, grace: Option<Duration>) -> Result<(), QueueError> {
        let was_open = self.sender.lock().await.take().is_some();
        self.stop_token.cancel();

        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        if was_open {
            info!(workers = handles.len(), "Stopping job queue");
        }

        let result = self.join_workers(handles, grace).await;
        self.fail_buffered().await;

        if was_open && result.is_ok() {
            info!("Job queue stopped");
        }
        result
    }

    async fn join_workers(
        &self,
        handles: Vec<JoinHandle<()>>,
        grace: Option<Duration>,
    ) -> Result<(), QueueError> {
        if handles.is_empty() {
            return Ok(());
        }

        let aborts: Vec<AbortHandle> = handles.iter().map(|h| h.abort_handle()).collect();
        let joined = futures::future::join_all(handles);
        tokio::pin!(joined);

        let Some(grace) = grace else {
            joined.await;
            return Ok(());
        };
        if tokio::time::timeout(grace, &mut joined).await.is_ok() {
            return Ok(());
        }

        warn!(?grace, "Workers still busy after grace period, cancelling");
        self.run_token.cancel();
        if tokio::time::timeout(CANCEL_DRAIN, &mut joined).await.is_err() {
            warn!("Handlers ignored cancellation, aborting workers");
            for abort in aborts {
                abort.abort();
            }
        }
        Err(QueueError::ShutdownTimeout(grace))
    }

    /// Fail jobs left in the channel; no worker will take them any more.
    async fn fail_buffered(&self) {
        let mut receiver = self.receiver.lock().await;
        while let Ok(job) = receiver.try_recv() {
            warn!(job_id = %job.id, "Job still queued at shutdown");
            self.abandon(job, QUEUE_CLOSED);
        }
    }

    /// Mark a job that will never reach a worker as failed.
    fn abandon(&self, mut job: ParseDocumentJob, reason: &str) {
        job.status = JobStatus::Failed;
        job.error = Some(reason.to_string());
        job.completed_at = Some(Utc::now());
        persist(self.store.as_ref(), &job);
        JOBS.with_label_values(&["failed"]).inc();
    }

    pub fn is_closed(&self) -> bool {
        self.stop_token.is_cancelled()
    }

    pub fn get_job(&self, id: &str) -> Result<Option<ParseDocumentJob>, QueueError> {
        Ok(self.store.get_by_id(id)?)
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<ParseDocumentJob>, QueueError> {
        Ok(self.store.list(filter)?)
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.run_token.cancel();
    }
}

async fn worker_loop(worker_id: usize, ctx: Arc<WorkerContext>) {
    debug!(worker_id, "Worker started");
    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.run_token.cancelled() => None,
            _ = ctx.stop_token.cancelled() => None,
            job = async { ctx.receiver.lock().await.recv().await } => job,
        };
        let Some(job) = next else { break };
        process_job(worker_id, &ctx, job).await;
    }
    debug!(worker_id, "Worker stopped");
}

fn persist(store: &dyn JobStore, job: &ParseDocumentJob) {
    if let Err(e) = store.save(job) {
        error!(job_id = %job.id, error = %e, "Failed to persist job");
    }
}

async fn process_job(worker_id: usize, ctx: &Arc<WorkerContext>, mut job: ParseDocumentJob) {
    job.status = JobStatus::Running;
    job.started_at = Some(Utc::now());
    job.completed_at = None;
    persist(ctx.store.as_ref(), &job);
    debug!(worker_id, job_id = %job.id, attempt = job.retry_count + 1, "Processing job");

    // The handler is cancelled through the token, never dropped, so it can
    // record its own failure before returning.
    let cancel = ctx.run_token.child_token();
    JOBS_IN_FLIGHT.inc();
    let result = ctx.handler.handle(&job, &cancel).await;
    JOBS_IN_FLIGHT.dec();

    match result {
        Ok(()) => {
            job.status = JobStatus::Completed;
            job.error = None;
            job.completed_at = Some(Utc::now());
            persist(ctx.store.as_ref(), &job);
            JOBS.with_label_values(&["completed"]).inc();
            info!(job_id = %job.id, document_id = %job.document_id, "Job completed");
        }
        Err(e) if ctx.run_token.is_cancelled() => {
            warn!(worker_id, job_id = %job.id, error = %e, "Job abandoned by shutdown");
        }
        Err(e) => {
            job.retry_count += 1;
            job.error = Some(e.to_string());

            if !e.is_permanent() && job.retry_count < job.max_retries {
                job.status = JobStatus::Retrying;
                persist(ctx.store.as_ref(), &job);
                JOBS.with_label_values(&["retried"]).inc();

                let backoff = ctx.config.backoff(job.retry_count);
                warn!(
                    job_id = %job.id,
                    retry = job.retry_count,
                    max_retries = job.max_retries,
                    ?backoff,
                    error = %e,
                    "Job failed, scheduling retry"
                );
                schedule_retry(Arc::clone(ctx), job, backoff);
            } else {
                job.status = JobStatus::Failed;
                job.completed_at = Some(Utc::now());
                persist(ctx.store.as_ref(), &job);
                JOBS.with_label_values(&["failed"]).inc();
                error!(
                    job_id = %job.id,
                    attempts = job.retry_count,
                    permanent = e.is_permanent(),
                    error = %e,
                    "Job failed"
                );
            }
        }
    }
}

/// Re-enqueue `job` once `backoff` has passed. Jobs whose queue closed in
/// the meantime stay `retrying`.
fn schedule_retry(ctx: Arc<WorkerContext>, mut job: ParseDocumentJob, backoff: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = ctx.run_token.cancelled() => return,
            _ = ctx.delay.wait(backoff) => {}
        }

        let Some(sender) = ctx.sender.lock().await.clone() else {
            warn!(job_id = %job.id, "Queue closed before retry, job left retrying");
            return;
        };

        job.status = JobStatus::Pending;
        job.started_at = None;
        job.completed_at = None;
        persist(ctx.store.as_ref(), &job);

        tokio::select! {
            biased;
            _ = ctx.run_token.cancelled() => {}
            sent = sender.send(job) => {
                if let Err(mpsc::error::SendError(job)) = sent {
                    warn!(job_id = %job.id, "Channel closed before retry could be enqueued");
                }
            }
        }
    });
}
