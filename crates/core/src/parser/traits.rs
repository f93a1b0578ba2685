//! Statement parser trait.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for statement parsing.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Empty document")]
    EmptyDocument,
}

impl ParserError {
    /// Whether re-invoking the service may produce a different result.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Json(_) | Self::EmptyDocument => false,
        }
    }
}

/// Extracts structured transaction data from raw statement bytes.
///
/// The output is opaque JSON; its shape is checked by the transformer.
#[async_trait]
pub trait StatementParser: Send + Sync {
    /// Model identifier, recorded on each parsing run.
    fn model(&self) -> &str;

    /// Parse a statement file.
    async fn parse(&self, content: &[u8]) -> Result<serde_json::Value, ParserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParserError::Api {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 503 - overloaded");
        assert!(err.is_retryable());

        let err = ParserError::Api {
            status: 400,
            message: "bad file".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!ParserError::Json("eof".to_string()).is_retryable());
        assert!(ParserError::Timeout(Duration::from_secs(5)).is_retryable());
    }
}
