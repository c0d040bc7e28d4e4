//! Storage error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StorageError.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write tile arrays {path}: {source}")]
    NpzWrite {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpzError,
    },

    #[error("Failed to read tile arrays {path}: {source}")]
    NpzRead {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpzError,
    },

    #[error("Invalid tile metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Tiles not found: {0}")]
    TilesNotFound(PathBuf),

    #[error("Forecast hour {hour} not present in {path}")]
    HourNotFound { hour: u32, path: PathBuf },

    #[error("Corrupt tile file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// Persisted layout does not match the caller's expectations; the cached
    /// entry must be rebuilt.
    #[error("Tile layout mismatch at {path}: {field} expected {expected}, found {actual}")]
    LayoutMismatch {
        path: PathBuf,
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the cached entry should be treated as a miss.
    pub fn is_cache_miss(&self) -> bool {
        matches!(
            self,
            StorageError::TilesNotFound(_)
                | StorageError::LayoutMismatch { .. }
                | StorageError::Corrupt { .. }
                | StorageError::NpzRead { .. }
                | StorageError::Metadata { .. }
        )
    }
}
