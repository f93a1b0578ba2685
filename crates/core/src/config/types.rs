use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ingest::IngestConfig;
use crate::parser::ParserConfig;
use crate::queue::QueueConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub parser: ParserConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ledgerline.db")
}

/// Source storage configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory that relative locators resolve against.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub parser: SanitizedParserConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
}

/// Sanitized parser config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedParserConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            parser: SanitizedParserConfig {
                endpoint: config.parser.endpoint.clone(),
                model: config.parser.model.clone(),
                api_key_configured: config
                    .parser
                    .api_key
                    .as_deref()
                    .is_some_and(|key| !key.is_empty()),
                timeout_secs: config.parser.timeout_secs,
            },
            database: config.database.clone(),
            storage: config.storage.clone(),
            ingest: config.ingest.clone(),
            queue: config.queue.clone(),
            logging: config.logging.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[parser]
endpoint = "http://localhost:9000/parse"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.parser.endpoint, "http://localhost:9000/parse");
        assert_eq!(config.parser.model, "statement-parser-v1");
        assert_eq!(config.parser.timeout_secs, 120);
        assert_eq!(config.database.path, PathBuf::from("ledgerline.db"));
        assert!(config.storage.root.is_none());
        assert_eq!(config.ingest.owner_id, "default");
        assert_eq!(config.ingest.parse_timeout_secs, 300);
        assert_eq!(config.queue.workers, 5);
        assert_eq!(config.queue.buffer_size, 100);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[parser]
endpoint = "https://parser.example.com/v1/statements"
api_key = "secret"
model = "statements-large"
timeout_secs = 60

[database]
path = "/var/lib/ledgerline/ledger.db"

[storage]
root = "/srv/statements"

[ingest]
owner_id = "household"
parse_timeout_secs = 90

[queue]
workers = 2
buffer_size = 10
max_retries = 5
backoff_unit_secs = 1

[logging]
json = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.parser.api_key.as_deref(), Some("secret"));
        assert_eq!(config.parser.model, "statements-large");
        assert_eq!(config.storage.root, Some(PathBuf::from("/srv/statements")));
        assert_eq!(config.ingest.owner_id, "household");
        assert_eq!(config.queue.max_retries, 5);
        assert!(config.logging.json);
    }

    #[test]
    fn test_deserialize_missing_parser_fails() {
        let toml = r#"
[queue]
workers = 2
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let toml = r#"
[parser]
endpoint = "http://localhost:9000/parse"
api_key = "super-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.parser.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
    }
}
