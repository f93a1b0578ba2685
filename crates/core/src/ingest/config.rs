//! Per-run configuration for the ingestion pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings threaded through every ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Owner recorded on new documents and persisted transactions.
    #[serde(default = "default_owner")]
    pub owner_id: String,

    /// Upper bound on a single call to the parsing service, in seconds.
    #[serde(default = "default_parse_timeout")]
    pub parse_timeout_secs: u64,
}

fn default_owner() -> String {
    "default".to_string()
}

fn default_parse_timeout() -> u64 {
    300 // 5 minutes
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            owner_id: default_owner(),
            parse_timeout_secs: default_parse_timeout(),
        }
    }
}

impl IngestConfig {
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    pub fn with_parse_timeout_secs(mut self, secs: u64) -> Self {
        self.parse_timeout_secs = secs;
        self
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs)
    }
}
