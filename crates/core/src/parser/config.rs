//! Configuration for the HTTP statement parser.

use serde::{Deserialize, Serialize};

/// Connection settings for the external parsing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Endpoint that accepts a multipart statement upload and returns JSON.
    pub endpoint: String,

    /// Bearer token, if the service requires one.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier passed to the service.
    #[serde(default = "default_model")]
    pub model: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "statement-parser-v1".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl ParserConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_timeout(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
