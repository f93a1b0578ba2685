//! Job storage trait and the in-memory backend.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use super::types::{JobFilter, JobStatus, ParseDocumentJob};

/// Errors from job store operations.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job has no id")]
    MissingId,

    #[error("job store lock poisoned")]
    LockPoisoned,
}

/// Trait for job storage backends.
///
/// Every returned job is a copy; mutating it does not affect the store.
pub trait JobStore: Send + Sync {
    /// Insert or replace a job.
    fn save(&self, job: &ParseDocumentJob) -> Result<(), JobStoreError>;

    fn get_by_id(&self, id: &str) -> Result<Option<ParseDocumentJob>, JobStoreError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<ParseDocumentJob>, JobStoreError>;

    /// Set a job's status and error text.
    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<(), JobStoreError>;
}

/// Job store keeping everything in a map behind one lock.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, ParseDocumentJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for InMemoryJobStore {
    fn save(&self, job: &ParseDocumentJob) -> Result<(), JobStoreError> {
        if job.id.is_empty() {
            return Err(JobStoreError::MissingId);
        }
        let mut jobs = self.jobs.write().map_err(|_| JobStoreError::LockPoisoned)?;
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<ParseDocumentJob>, JobStoreError> {
        let jobs = self.jobs.read().map_err(|_| JobStoreError::LockPoisoned)?;
        Ok(jobs.get(id).cloned())
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<ParseDocumentJob>, JobStoreError> {
        let jobs = self.jobs.read().map_err(|_| JobStoreError::LockPoisoned)?;

        let mut matched: Vec<ParseDocumentJob> =
            jobs.values().filter(|job| filter.matches(job)).cloned().collect();
        // Newest first; id breaks ties so paging is stable.
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let limit = if filter.limit == 0 {
            usize::MAX
        } else {
            filter.limit
        };
        Ok(matched.into_iter().skip(filter.offset).take(limit).collect())
    }

    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| JobStoreError::LockPoisoned)?;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;
        job.status = status;
        job.error = error;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn job(id: &str, document_id: &str, age_secs: i64) -> ParseDocumentJob {
        let mut job = ParseDocumentJob::new(document_id, format!("{}.pdf", document_id)).with_id(id);
        job.created_at = Some(Utc::now() - Duration::seconds(age_secs));
        job
    }

    #[test]
    fn test_save_and_get() {
        let store = InMemoryJobStore::new();
        store.save(&job("j1", "doc-1", 0)).unwrap();

        let fetched = store.get_by_id("j1").unwrap().unwrap();
        assert_eq!(fetched.document_id, "doc-1");
        assert!(store.get_by_id("missing").unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_save_requires_id() {
        let store = InMemoryJobStore::new();
        let err = store.save(&ParseDocumentJob::new("doc", "a.pdf")).unwrap_err();
        assert!(matches!(err, JobStoreError::MissingId));
        assert!(store.is_empty());
    }

    #[test]
    fn test_returned_jobs_are_copies() {
        let store = InMemoryJobStore::new();
        store.save(&job("j1", "doc-1", 0)).unwrap();

        let mut copy = store.get_by_id("j1").unwrap().unwrap();
        copy.status = JobStatus::Failed;
        copy.error = Some("tampered".to_string());

        let stored = store.get_by_id("j1").unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        assert!(stored.error.is_none());
    }

    #[test]
    fn test_list_newest_first_with_paging() {
        let store = InMemoryJobStore::new();
        store.save(&job("old", "doc-1", 30)).unwrap();
        store.save(&job("mid", "doc-2", 20)).unwrap();
        store.save(&job("new", "doc-1", 10)).unwrap();

        let all = store.list(&JobFilter::new()).unwrap();
        let ids: Vec<_> = all.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        let page = store
            .list(&JobFilter::new().with_limit(1).with_offset(1))
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "mid");

        let doc_1 = store.list(&JobFilter::new().with_document_id("doc-1")).unwrap();
        assert_eq!(doc_1.len(), 2);
    }

    #[test]
    fn test_update_status() {
        let store = InMemoryJobStore::new();
        store.save(&job("j1", "doc-1", 0)).unwrap();

        store
            .update_status("j1", JobStatus::Failed, Some("boom".to_string()))
            .unwrap();
        let stored = store.get_by_id("j1").unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("boom"));

        let failed = store
            .list(&JobFilter::new().with_status(JobStatus::Failed))
            .unwrap();
        assert_eq!(failed.len(), 1);

        let err = store
            .update_status("missing", JobStatus::Completed, None)
            .unwrap_err();
        assert!(matches!(err, JobStoreError::NotFound(_)));
    }
}
