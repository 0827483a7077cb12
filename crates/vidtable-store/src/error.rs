//! Error types for blob store operations.
//!
//! The retryable/terminal split drives the backoff policy: `Transient`
//! failures are retried by the write/read helpers until the policy's cap,
//! then promoted to `Terminal`; everything else surfaces immediately.

use thiserror::Error;

/// Errors that can occur in blob store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unparseable args or an unknown storage type
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed object path
    #[error("invalid path: {0}")]
    Path(String),

    /// Object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Retryable failure (transient network, transient unavailability)
    #[error("transient storage error: {0}")]
    Transient(String),

    /// Non-retryable failure (permission, quota, retry exhaustion)
    #[error("storage error: {0}")]
    Terminal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Other(String),
}

impl StoreError {
    /// True when the caller should retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    /// Classify an `object_store` failure into retryable vs. terminal.
    pub(crate) fn from_object_store(err: object_store::Error) -> Self {
        use object_store::Error as OsError;
        match err {
            OsError::NotFound { path, .. } => StoreError::NotFound(path),
            OsError::InvalidPath { source } => StoreError::Path(source.to_string()),
            OsError::PermissionDenied { .. }
            | OsError::Unauthenticated { .. }
            | OsError::AlreadyExists { .. }
            | OsError::Precondition { .. }
            | OsError::NotSupported { .. }
            | OsError::NotImplemented { .. }
            | OsError::UnknownConfigurationKey { .. } => StoreError::Terminal(err.to_string()),
            // Generic covers backend transport failures; treat those and any
            // future variants as retryable.
            _ => StoreError::Transient(err.to_string()),
        }
    }
}

/// Result type for blob store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
