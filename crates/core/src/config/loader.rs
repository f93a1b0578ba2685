use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides, e.g. `LEDGERLINE_QUEUE__WORKERS=2`.
pub const ENV_PREFIX: &str = "LEDGERLINE_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[parser]
endpoint = "http://localhost:9000/parse"

[queue]
workers = 3
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.queue.workers, 3);
    }

    #[test]
    fn test_load_config_from_str_missing_parser() {
        let toml = r#"
[queue]
workers = 3
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/ledgerline.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[parser]
endpoint = "http://127.0.0.1:9000/parse"

[database]
path = "/tmp/ledger.db"

[ingest]
owner_id = "household"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.parser.endpoint, "http://127.0.0.1:9000/parse");
        assert_eq!(config.database.path.to_string_lossy(), "/tmp/ledger.db");
        assert_eq!(config.ingest.owner_id, "household");
    }
}
