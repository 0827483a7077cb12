//! Error types for video indexing, descriptors, and decoding.

use thiserror::Error;
use vidtable_store::StoreError;

/// Errors that can occur in video operations.
#[derive(Error, Debug)]
pub enum VideoError {
    /// Malformed Annex-B input: bad start code framing or a truncated NAL
    #[error("invalid bitstream: {0}")]
    Bitstream(String),

    /// Decoder backend failure; fatal to the stream
    #[error("decoder failed: {0}")]
    Decoder(String),

    /// Descriptor/data mismatch detected while opening or validating an item
    #[error("corrupted item: {0}")]
    Corrupted(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("descriptor decode error: {0}")]
    Proto(#[from] prost::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for video operations.
pub type Result<T> = std::result::Result<T, VideoError>;
