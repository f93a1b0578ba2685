//! Source storage trait.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while fetching a source file.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Unsupported source locator: {0}")]
    UnsupportedLocator(String),

    #[error("I/O error reading {locator}: {source}")]
    Io {
        locator: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Whether a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Read access to raw source files.
#[async_trait]
pub trait SourceStorage: Send + Sync {
    /// Returns the name of this storage implementation.
    fn name(&self) -> &str;

    /// Downloads the raw bytes behind a locator.
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, StorageError>;

    /// Extracts a human-readable filename from a locator.
    fn filename(&self, locator: &str) -> String {
        filename_from_locator(locator)
    }
}

/// Last path segment of a locator, without query string or fragment.
///
/// Falls back to `"document"` when nothing usable remains.
pub fn filename_from_locator(locator: &str) -> String {
    let without_suffix = locator
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let trimmed = without_suffix.trim_end_matches(['/', '\\']);
    let name = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name.ends_with(':') {
        "document".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_locator() {
        assert_eq!(
            filename_from_locator("s3://statements/2024/jan.pdf"),
            "jan.pdf"
        );
        assert_eq!(filename_from_locator("file:///tmp/a/b.pdf"), "b.pdf");
        assert_eq!(
            filename_from_locator("https://host/x/report.pdf?sig=abc#page=2"),
            "report.pdf"
        );
        assert_eq!(filename_from_locator("plain.pdf"), "plain.pdf");
        assert_eq!(filename_from_locator("C:\\scans\\may.pdf"), "may.pdf");
        assert_eq!(filename_from_locator("dir/sub/"), "sub");
    }

    #[test]
    fn test_filename_fallback() {
        assert_eq!(filename_from_locator(""), "document");
        assert_eq!(filename_from_locator("s3://"), "document");
        assert_eq!(filename_from_locator("?only=query"), "document");
    }

    #[test]
    fn test_retryable() {
        let io = StorageError::Io {
            locator: "x".to_string(),
            source: std::io::Error::other("disk"),
        };
        assert!(io.is_retryable());
        assert!(!StorageError::NotFound("x".to_string()).is_retryable());
    }
}
