//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ChannelsConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ChannelsConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    load_config_str(&content)
}

/// Parse and validate configuration from TOML text.
pub fn load_config_str(content: &str) -> Result<ChannelsConfig, ConfigError> {
    let config: ChannelsConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = load_config_str("").unwrap();
        assert_eq!(config.log, ChannelsConfig::default().log);
    }

    #[test]
    fn test_partial_sections_override() {
        let config = load_config_str(
            r#"
            [lifecycle]
            poll_interval_ms = 5
            react_to_status_changes = false

            [retries]
            max_attempts = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.lifecycle.poll_interval_ms, 5);
        assert!(!config.lifecycle.react_to_status_changes);
        assert_eq!(config.lifecycle.network_ready_timeout_ms, 30_000);
        assert_eq!(config.retries.max_attempts, 1);
    }

    #[test]
    fn test_validation_errors_are_joined() {
        let err = load_config_str(
            r#"
            [log]
            irq = 43
            endpoint = ""
            receive_buffer_len = 0
            send_buffer_len = 512
            "#,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Validation failed: "));
        assert!(message.contains("receive_buffer_len"));
        assert!(message.contains("endpoint must not be empty"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/channels.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
