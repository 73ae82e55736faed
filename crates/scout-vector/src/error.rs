//! Error types for scout-vector.

use thiserror::Error;

/// Result type for scout-vector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in scout-vector operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Dimension mismatch between a vector and the index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensions fixed by the first inserted vector.
        expected: usize,
        /// Dimensions of the offending vector.
        actual: usize,
    },

    /// Invalid vector (empty, NaN or infinite components).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Unknown distance metric name.
    #[error("Unknown distance metric: {0}")]
    UnknownMetric(String),
}
