// Engine error taxonomy.
//
// Only structurally invalid input is an error. Numeric corner cases (zero
// vectors, empty candidate pools, short result lists) are handled where they
// occur and never surface here. An unresolved label is `None` from the
// reconciler, not an error.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the topic-gap and similarity engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Raw input is neither a list of records nor a topic mapping, or a
    /// mapping entry has no usable vector.
    #[error("invalid input format: {0}")]
    InvalidFormat(String),

    /// Two vectors that must be compared or averaged have different lengths.
    #[error("vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The requested region, topic or source has no data at all.
    #[error("no data: {0}")]
    NotFound(String),
}

impl EngineError {
    /// True for errors caused by the caller's input shape (as opposed to
    /// missing data). These are not retryable.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidFormat(_) | EngineError::DimensionMismatch { .. }
        )
    }
}
