//! Observer configuration settings
//!
//! Environment-driven settings for the observer and its logging

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main observer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Observer behaviour
    pub observer: ObserverConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Observer behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Master switch; when off every call passes through untouched
    pub enabled: bool,
    /// Register the root-level generic parser after all SDK handlers
    pub generic_fallback: bool,
    /// Method-name fragments that mark a streaming call site
    pub stream_markers: Vec<String>,
    /// Feed committed records into the process-wide statistics
    pub record_stats: bool,
    /// Optional JSON library configuration file
    pub library_config: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (text/json)
    pub format: String,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            generic_fallback: false,
            stream_markers: vec!["stream".to_string()],
            record_stats: true,
            library_config: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            observer: ObserverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Create a new configuration instance from the environment
    pub fn new() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let settings = Self {
            observer: ObserverConfig {
                enabled: get_env_or_default("USAGE_OBSERVER_ENABLED", "true")
                    .parse()
                    .context("Invalid USAGE_OBSERVER_ENABLED flag")?,
                generic_fallback: get_env_or_default("USAGE_OBSERVER_GENERIC_FALLBACK", "false")
                    .parse()
                    .context("Invalid USAGE_OBSERVER_GENERIC_FALLBACK flag")?,
                stream_markers: get_env_or_default("USAGE_OBSERVER_STREAM_MARKERS", "stream")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                record_stats: get_env_or_default("USAGE_OBSERVER_RECORD_STATS", "true")
                    .parse()
                    .context("Invalid USAGE_OBSERVER_RECORD_STATS flag")?,
                library_config: std::env::var("USAGE_OBSERVER_LIBRARY_CONFIG")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from),
            },
            logging: LoggingConfig {
                level: get_env_or_default("RUST_LOG", "info"),
                format: get_env_or_default("LOG_FORMAT", "text"),
            },
        };

        // Validate configuration
        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        if self.observer.stream_markers.is_empty() {
            anyhow::bail!("At least one stream marker must be configured");
        }

        if self
            .observer
            .stream_markers
            .iter()
            .any(|m| m.trim().is_empty())
        {
            anyhow::bail!("Stream markers cannot be blank");
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        // Validate log format
        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        Ok(())
    }
}

/// Get environment variable or default value
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
