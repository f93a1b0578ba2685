use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Parser endpoint is set (the section itself is enforced by serde)
/// - Queue has at least one worker, buffer slot and attempt
/// - Parse timeout is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.parser.endpoint.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "parser.endpoint cannot be empty".to_string(),
        ));
    }

    if config.queue.workers == 0 {
        return Err(ConfigError::ValidationError(
            "queue.workers cannot be 0".to_string(),
        ));
    }

    if config.queue.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "queue.buffer_size cannot be 0".to_string(),
        ));
    }

    if config.queue.max_retries == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_retries cannot be 0".to_string(),
        ));
    }

    if config.ingest.parse_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.parse_timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, LoggingConfig, StorageConfig};
    use crate::ingest::IngestConfig;
    use crate::parser::ParserConfig;
    use crate::queue::QueueConfig;

    fn valid_config() -> Config {
        Config {
            parser: ParserConfig::new("http://localhost:9000/parse"),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            ingest: IngestConfig::default(),
            queue: QueueConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    fn assert_invalid(config: &Config, field: &str) {
        match validate_config(config) {
            Err(ConfigError::ValidationError(message)) => assert!(
                message.contains(field),
                "expected {} in {:?}",
                field,
                message
            ),
            other => panic!("expected validation error for {}, got {:?}", field, other),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_empty_endpoint_fails() {
        let mut config = valid_config();
        config.parser.endpoint = "  ".to_string();
        assert_invalid(&config, "parser.endpoint");
    }

    #[test]
    fn test_validate_queue_limits() {
        let mut config = valid_config();
        config.queue.workers = 0;
        assert_invalid(&config, "queue.workers");

        let mut config = valid_config();
        config.queue.buffer_size = 0;
        assert_invalid(&config, "queue.buffer_size");

        let mut config = valid_config();
        config.queue.max_retries = 0;
        assert_invalid(&config, "queue.max_retries");
    }

    #[test]
    fn test_validate_parse_timeout_zero_fails() {
        let mut config = valid_config();
        config.ingest.parse_timeout_secs = 0;
        assert_invalid(&config, "ingest.parse_timeout_secs");
    }
}
