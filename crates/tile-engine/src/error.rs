//! Error types for tile aggregation.

use grib_reader::ReaderError;
use thiserror::Error;

/// Result type alias using TileError.
pub type Result<T> = std::result::Result<T, TileError>;

/// Errors that can occur while building tiles.
#[derive(Error, Debug)]
pub enum TileError {
    /// No hours were supplied to aggregate.
    #[error("no forecast hours to aggregate")]
    EmptyHourMap,

    /// Every supplied hour failed to open or reduce.
    #[error("no hours reduced out of {attempted} attempted")]
    NoHoursReduced { attempted: usize },

    /// The variable's field, alternates and components are all absent.
    #[error("field for variable '{variable}' not found (available: {available:?})")]
    FieldNotFound {
        variable: String,
        available: Vec<String>,
    },

    /// Value array length does not match the indexed native grid.
    #[error("expected {expected} native values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// None of the native points fall inside the requested bounds.
    #[error("no native grid points inside {0}")]
    NoPointsInBounds(String),

    /// Resolution must be positive and finite.
    #[error("invalid resolution: {0}")]
    InvalidResolution(f64),

    /// Underlying dataset read failure.
    #[error(transparent)]
    Reader(#[from] ReaderError),
}
