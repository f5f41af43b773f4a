//! Configuration management for shell-context.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::argv::{ArgvEncoder, DEFAULT_MAX_BYTES};
use crate::cli::Args;
use crate::session::Dispatcher;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Argument encoding limits.
    pub argv: ArgvSection,
    /// Session worker settings.
    pub dispatch: DispatchSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Argument encoding section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgvSection {
    /// Maximum size of an encoded argument block in bytes; 0 disables it.
    pub max_bytes: usize,
}

impl Default for ArgvSection {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

/// Session worker section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    /// Worker threads are named `<prefix>-<session id>`.
    pub thread_name_prefix: String,
    /// Worker stack size in bytes (platform default if unset).
    pub stack_size: Option<usize>,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            thread_name_prefix: "session".to_string(),
            stack_size: None,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var("SHELL_CONTEXT_ARGV_MAX_BYTES") {
            self.argv.max_bytes = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SHELL_CONTEXT_ARGV_MAX_BYTES", value))?;
        }

        if let Ok(prefix) = std::env::var("SHELL_CONTEXT_THREAD_PREFIX") {
            if !prefix.is_empty() {
                self.dispatch.thread_name_prefix = prefix;
            }
        }

        if let Ok(level) = std::env::var("SHELL_CONTEXT_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(max_bytes) = args.max_bytes {
            self.argv.max_bytes = max_bytes;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Argument encoder honoring the configured limit.
    pub fn encoder(&self) -> ArgvEncoder {
        ArgvEncoder::new(self.argv.max_bytes)
    }

    /// Dispatcher using the configured worker settings.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::from_config(&self.dispatch)
    }

    /// Get the log filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// An environment override could not be parsed.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}
