//! Error types for native dataset reading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using ReaderError.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Errors that can occur while opening and decoding a native dataset.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Failed to read the file from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed or a message failed to decode.
    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// The file parsed but contained no usable fields.
    #[error("no decodable fields in {0}")]
    Empty(PathBuf),

    /// Coordinate arrays do not line up with field values.
    #[error("field '{field}' has {values} values but the grid has {points} points")]
    LengthMismatch {
        field: String,
        values: usize,
        points: usize,
    },

    /// The grid template cannot be converted to latitude/longitude.
    #[error("unsupported grid template {template} in {path}")]
    UnsupportedGrid { path: PathBuf, template: u16 },
}

impl ReaderError {
    /// Create a Decode error.
    pub fn decode(path: impl Into<PathBuf>, msg: impl std::fmt::Display) -> Self {
        Self::Decode {
            path: path.into(),
            message: msg.to_string(),
        }
    }
}
