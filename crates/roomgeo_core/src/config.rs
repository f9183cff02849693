//! Store configuration loaded from a JSON file.
//!
//! # Responsibility
//! - Describe database location, transaction mode and logging settings.
//! - Provide defaults for every field so partial files are accepted.
//!
//! # Invariants
//! - `transaction = false` (the default) selects best-effort writes.
//! - `compensate_best_effort` has no effect in transactional mode.

use crate::txn::TransactionMode;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const DEFAULT_DATABASE_PATH: &str = "roomgeo.sqlite3";
const SUPPORTED_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "warning", "error"];

/// Runtime configuration for one store process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file shared by every request handler.
    pub database_path: String,
    /// Whether multi-document writes run inside one transaction.
    pub transaction: bool,
    /// Undo earlier writes of a failed best-effort save.
    pub compensate_best_effort: bool,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            transaction: false,
            compensate_best_effort: false,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn transaction_mode(&self) -> TransactionMode {
        if self.transaction {
            TransactionMode::Transactional
        } else {
            TransactionMode::BestEffort
        }
    }

    /// Validates field-level invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "database_path must not be empty".to_string(),
            ));
        }
        let level = self.log_level.trim().to_ascii_lowercase();
        if !SUPPORTED_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unsupported log_level `{}`",
                self.log_level
            )));
        }
        Ok(())
    }
}

/// Configuration load errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Parses and validates configuration from JSON text.
pub fn parse_config(text: &str) -> Result<StoreConfig, ConfigError> {
    let config: StoreConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Reads, parses and validates a JSON configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<StoreConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}
