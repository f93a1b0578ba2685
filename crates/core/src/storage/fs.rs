//! Local filesystem storage.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{SourceStorage, StorageError};

/// Reads sources from the local filesystem.
///
/// Accepts plain paths and `file://` URIs. Relative paths resolve against
/// the configured root when one is set.
#[derive(Debug, Clone, Default)]
pub struct FsStorage {
    root: Option<PathBuf>,
}

impl FsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative locators against `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn resolve(&self, locator: &str) -> Result<PathBuf, StorageError> {
        let raw = match locator.split_once("://") {
            Some(("file", rest)) => rest,
            Some(_) => return Err(StorageError::UnsupportedLocator(locator.to_string())),
            None => locator,
        };

        if raw.trim().is_empty() {
            return Err(StorageError::UnsupportedLocator(locator.to_string()));
        }

        let path = PathBuf::from(raw);
        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        })
    }
}

#[async_trait]
impl SourceStorage for FsStorage {
    fn name(&self) -> &str {
        "fs"
    }

    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(locator)?;
        debug!(path = %path.display(), "Reading source file");

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(locator.to_string()),
            _ => StorageError::Io {
                locator: locator.to_string(),
                source: e,
            },
        })
    }
}
