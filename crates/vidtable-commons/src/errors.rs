//! Shared error types for vidtable.
//!
//! Crates with richer failure modes (storage, video, engine) define their own
//! error enums; this one covers the validation failures of the core data
//! model without pulling in any of those crates.

use thiserror::Error;

/// Common error type for data-model operations.
#[derive(Debug, Clone, Error)]
pub enum CommonError {
    /// Invalid input provided to a constructor or helper
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A buffer's length does not match the declared frame geometry
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Internal error (unexpected state)
    #[error("internal error: {0}")]
    Internal(String),
}

impl CommonError {
    /// Creates an InvalidInput error with a message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result type alias using CommonError.
pub type Result<T> = std::result::Result<T, CommonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommonError::invalid_input("shape has 4 dimensions");
        assert_eq!(err.to_string(), "invalid input: shape has 4 dimensions");

        let err = CommonError::SizeMismatch {
            expected: 12,
            actual: 4,
        };
        assert_eq!(err.to_string(), "size mismatch: expected 12 bytes, got 4");
    }
}
