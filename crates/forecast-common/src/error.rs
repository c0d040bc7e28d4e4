//! Error types for configuration and identifiers shared across crates.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading the static catalog or parsing identifiers.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Invalid run id '{0}': expected run_YYYYMMDD_HH")]
    InvalidRunId(String),

    #[error("Invalid forecast hour schedule for model '{model}': {message}")]
    InvalidSchedule { model: String, message: String },
}
