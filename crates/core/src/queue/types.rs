//! Job record and query types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a parse job.
///
/// `pending → running → completed | failed | retrying`, and a retrying job
/// returns to `pending` when it is re-enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Retrying => "retrying",
        }
    }

    /// Completed and failed jobs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to parse one document, tracked through the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseDocumentJob {
    /// Assigned by the queue on enqueue when empty.
    pub id: String,
    pub document_id: String,
    pub source_uri: String,
    pub status: JobStatus,
    /// Assigned by the queue on enqueue when absent.
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Text of the most recent failure.
    pub error: Option<String>,
    pub retry_count: u32,
    /// Attempts allowed before the job fails permanently. Zero means "use
    /// the queue default".
    pub max_retries: u32,
}

impl ParseDocumentJob {
    pub fn new(document_id: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            document_id: document_id.into(),
            source_uri: source_uri.into(),
            status: JobStatus::Pending,
            created_at: None,
            started_at: None,
            completed_at: None,
            error: None,
            retry_count: 0,
            max_retries: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Filter for querying jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub document_id: Option<String>,
    pub status: Option<JobStatus>,
    /// Maximum number of results (0 = unlimited).
    pub limit: usize,
    pub offset: usize,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Whether `job` passes the document and status criteria.
    pub fn matches(&self, job: &ParseDocumentJob) -> bool {
        if let Some(document_id) = &self.document_id {
            if &job.document_id != document_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_defaults() {
        let job = ParseDocumentJob::new("doc-1", "file:///a.pdf");
        assert!(job.id.is_empty());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.max_retries, 0);
        assert!(job.created_at.is_none());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&JobStatus::Retrying).unwrap();
        assert_eq!(json, "\"retrying\"");
        assert_eq!(JobStatus::Completed.to_string(), "completed");
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Retrying.is_terminal());
    }

    #[test]
    fn test_filter_matches() {
        let mut job = ParseDocumentJob::new("doc-1", "a.pdf");
        job.status = JobStatus::Running;

        assert!(JobFilter::new().matches(&job));
        assert!(JobFilter::new().with_document_id("doc-1").matches(&job));
        assert!(!JobFilter::new().with_document_id("doc-2").matches(&job));
        assert!(JobFilter::new()
            .with_status(JobStatus::Running)
            .matches(&job));
        assert!(!JobFilter::new()
            .with_document_id("doc-1")
            .with_status(JobStatus::Failed)
            .matches(&job));
    }
}
