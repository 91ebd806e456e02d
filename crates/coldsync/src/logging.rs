//! Logging setup.
//!
//! Structured events via `tracing`, written to stderr as text or JSON.
//! `COLDSYNC_LOG` (an `EnvFilter` directive string) takes precedence over the
//! configured level.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::{EngineError, Result};

/// Environment variable holding a filter directive, e.g. `coldsync=debug`.
pub const LOG_ENV: &str = "COLDSYNC_LOG";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: text or json
    #[serde(default)]
    pub format: LogFormat,

    /// Colored output (text format only)
    #[serde(default = "default_true")]
    pub color: bool,
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            color: default_true(),
        }
    }
}

/// Install the global subscriber. Call once, before the first event.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_env_filter(config)?;
    let base_subscriber = Registry::default().with(filter);

    let installed = match config.format {
        LogFormat::Json => base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => base_subscriber
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(config.color)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    installed.map_err(|e| EngineError::Config(format!("logging already initialized: {e}")))
}

/// Build the filter from `COLDSYNC_LOG`, falling back to the configured level.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.level)
        .map_err(|e| EngineError::Config(format!("invalid log level {:?}: {e}", config.level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults() {
        let config: LoggingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoggingConfig::default());
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_logging_format_parses_lowercase() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"level": "debug", "format": "json"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var(LOG_ENV).is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "coldsync=[".into(),
            ..LoggingConfig::default()
        };
        assert!(matches!(
            build_env_filter(&config),
            Err(EngineError::Config(_))
        ));
    }
}
