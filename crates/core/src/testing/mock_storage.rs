//! Mock source storage for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::storage::{SourceStorage, StorageError};

/// In-memory implementation of the SourceStorage trait.
///
/// Files are registered by locator. Unknown locators fail with
/// `StorageError::NotFound`; [`MockStorage::set_unavailable`] makes every
/// fetch fail with a retryable I/O error.
#[derive(Debug, Default)]
pub struct MockStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
    unavailable: RwLock<Option<String>>,
    fetch_count: AtomicUsize,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file before the storage is shared.
    pub fn with_file(mut self, locator: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.get_mut().insert(locator.into(), content.into());
        self
    }

    pub async fn add_file(&self, locator: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.write().await.insert(locator.into(), content.into());
    }

    /// Fail every fetch with an I/O error carrying `message`.
    pub async fn set_unavailable(&self, message: impl Into<String>) {
        *self.unavailable.write().await = Some(message.into());
    }

    pub async fn set_available(&self) {
        *self.unavailable.write().await = None;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceStorage for MockStorage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.unavailable.read().await.as_ref() {
            return Err(StorageError::Io {
                locator: locator.to_string(),
                source: std::io::Error::other(message.clone()),
            });
        }

        self.files
            .read()
            .await
            .get(locator)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(locator.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_registered_file() {
        let storage = MockStorage::new().with_file("s3://bucket/a.pdf", b"pdf".to_vec());
        assert_eq!(storage.fetch("s3://bucket/a.pdf").await.unwrap(), b"pdf");
        assert_eq!(storage.filename("s3://bucket/a.pdf"), "a.pdf");
        assert_eq!(storage.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_and_unavailable() {
        let storage = MockStorage::new();
        assert!(matches!(
            storage.fetch("missing.pdf").await,
            Err(StorageError::NotFound(_))
        ));

        storage.add_file("a.pdf", b"x".to_vec()).await;
        storage.set_unavailable("network down").await;
        let err = storage.fetch("a.pdf").await.unwrap_err();
        assert!(err.is_retryable());

        storage.set_available().await;
        assert!(storage.fetch("a.pdf").await.is_ok());
    }
}
