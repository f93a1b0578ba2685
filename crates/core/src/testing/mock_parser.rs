//! Mock statement parser for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::parser::{ParserError, StatementParser};

/// Scripted implementation of the StatementParser trait.
///
/// Queued outcomes are consumed first, one per call; once the queue is empty
/// every call returns the default response (or an empty transaction list).
///
/// # Example
///
/// ```rust,ignore
/// use ledgerline_core::testing::{fixtures, MockStatementParser};
///
/// let parser = MockStatementParser::new().with_response(fixtures::coffee_output());
/// parser.push_error(ParserError::Http("connection reset".into())).await;
///
/// // First call fails, later calls return the coffee statement.
/// ```
#[derive(Debug)]
pub struct MockStatementParser {
    model: String,
    default_response: RwLock<Value>,
    queued: RwLock<VecDeque<Result<Value, ParserError>>>,
    /// Simulated service latency.
    latency: RwLock<Duration>,
    call_count: AtomicUsize,
    last_content: RwLock<Option<Vec<u8>>>,
}

impl Default for MockStatementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStatementParser {
    pub fn new() -> Self {
        Self {
            model: "mock-parser".to_string(),
            default_response: RwLock::new(serde_json::json!({ "transactions": [] })),
            queued: RwLock::new(VecDeque::new()),
            latency: RwLock::new(Duration::ZERO),
            call_count: AtomicUsize::new(0),
            last_content: RwLock::new(None),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        *self.default_response.get_mut() = response;
        self
    }

    pub async fn set_response(&self, response: Value) {
        *self.default_response.write().await = response;
    }

    /// Queue a one-shot successful response.
    pub async fn push_response(&self, response: Value) {
        self.queued.write().await.push_back(Ok(response));
    }

    /// Queue a one-shot failure.
    pub async fn push_error(&self, error: ParserError) {
        self.queued.write().await.push_back(Err(error));
    }

    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Bytes received by the most recent call.
    pub async fn last_content(&self) -> Option<Vec<u8>> {
        self.last_content.read().await.clone()
    }
}

#[async_trait]
impl StatementParser for MockStatementParser {
    fn model(&self) -> &str {
        &self.model
    }

    async fn parse(&self, content: &[u8]) -> Result<Value, ParserError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *self.last_content.write().await = Some(content.to_vec());

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(outcome) = self.queued.write().await.pop_front() {
            return outcome;
        }
        Ok(self.default_response.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_outcomes_then_default() {
        let parser = MockStatementParser::new().with_response(serde_json::json!({ "n": 1 }));
        parser.push_error(ParserError::EmptyDocument).await;
        parser.push_response(serde_json::json!({ "n": 0 })).await;

        assert!(parser.parse(b"a").await.is_err());
        assert_eq!(parser.parse(b"b").await.unwrap()["n"], 0);
        assert_eq!(parser.parse(b"c").await.unwrap()["n"], 1);
        assert_eq!(parser.call_count(), 3);
        assert_eq!(parser.last_content().await.as_deref(), Some(&b"c"[..]));
    }
}
