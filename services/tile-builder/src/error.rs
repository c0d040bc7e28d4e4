//! Error types for fetching and run discovery.

use std::path::PathBuf;

use forecast_common::ConfigError;
use storage::StorageError;
use thiserror::Error;

/// Failure of one artifact fetch or of one attempt within it.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeout, non-success status or connection failure.
    #[error("Request to {url} failed: {message}")]
    Transient { url: String, message: String },

    /// The file opened but its field could not be materialized.
    #[error("Artifact {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Artifact {path} too small: {size} bytes (minimum {min})")]
    TooSmall { path: PathBuf, size: u64, min: u64 },

    /// Every attempt failed.
    #[error("Failed to download {path} after {attempts} attempts: {last_error}")]
    DownloadExhausted {
        path: PathBuf,
        attempts: u32,
        last_error: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl FetchError {
    pub(crate) fn transient(url: &str, message: impl std::fmt::Display) -> Self {
        FetchError::Transient {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure to find a run to build.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No published run of {model} found in the last {lookback_hours} hours")]
    NoRunFound { model: String, lookback_hours: u32 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
