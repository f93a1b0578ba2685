//! HTTP client for the external statement parsing service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use super::{ParserConfig, ParserError, StatementParser};

/// Uploads statements to a parsing service as multipart form data.
///
/// The service receives the file under `file` and the model identifier
/// under `model`, and answers with the extracted JSON document.
pub struct HttpStatementParser {
    client: Client,
    config: ParserConfig,
}

impl HttpStatementParser {
    pub fn new(config: ParserConfig) -> Result<Self, ParserError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ParserError::Http(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}

#[async_trait]
impl StatementParser for HttpStatementParser {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn parse(&self, content: &[u8]) -> Result<serde_json::Value, ParserError> {
        if content.is_empty() {
            return Err(ParserError::EmptyDocument);
        }

        let file = Part::bytes(content.to_vec())
            .file_name("statement.pdf")
            .mime_str("application/pdf")
            .map_err(|e| ParserError::Http(e.to_string()))?;
        let form = Form::new()
            .text("model", self.config.model.clone())
            .part("file", file);

        let mut request = self.client.post(&self.config.endpoint).multipart(form);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        debug!(endpoint = %self.config.endpoint, bytes = content.len(), "Sending statement to parser");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ParserError::Timeout(self.timeout())
            } else {
                ParserError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ParserError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ParserError::Json(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_from_config() {
        let parser =
            HttpStatementParser::new(ParserConfig::new("http://127.0.0.1:1/parse").with_model("m-1"))
                .unwrap();
        assert_eq!(parser.model(), "m-1");
    }

    #[tokio::test]
    async fn test_empty_document_rejected_before_request() {
        let parser = HttpStatementParser::new(ParserConfig::new("http://127.0.0.1:1/parse")).unwrap();
        let err = parser.parse(&[]).await.unwrap_err();
        assert!(matches!(err, ParserError::EmptyDocument));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_retryable() {
        let parser = HttpStatementParser::new(
            ParserConfig::new("http://127.0.0.1:1/parse").with_timeout_secs(2),
        )
        .unwrap();
        let err = parser.parse(b"%PDF").await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }
}
