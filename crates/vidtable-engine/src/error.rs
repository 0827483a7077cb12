//! Error types for the save/load workers and the columnar layout.

use thiserror::Error;
use vidtable_commons::CommonError;
use vidtable_store::StoreError;
use vidtable_video::VideoError;

/// Errors that can occur in engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error(transparent)]
    Common(#[from] CommonError),

    /// Descriptor/data/metadata mismatch, or data present without the
    /// descriptor that marks an item complete
    #[error("corrupted item: {0}")]
    Corrupted(String),

    /// A malformed batched payload handed to a worker
    #[error("invalid work entry: {0}")]
    InvalidEntry(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
