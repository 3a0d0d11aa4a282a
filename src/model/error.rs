//! Data model error types
//!
//! Validation failures for time sequences and evaluation contexts.

use thiserror::Error;

/// Errors raised while constructing or combining data-model values
#[derive(Error, Debug)]
pub enum DataError {
    /// Sequence construction rejected (bad step or unaligned start)
    #[error("invalid sequence spec: {0}")]
    InvalidSeqSpec(String),

    /// Evaluation context rejected (bad window or step)
    #[error("invalid context: {0}")]
    InvalidContext(String),

    /// Time zone name not present in the zone database
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Two sequences with differing grids were combined
    #[error("misaligned series: {0}")]
    Misaligned(String),
}

/// Result type for data-model operations
pub type DataResult<T> = Result<T, DataError>;
