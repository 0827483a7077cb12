//! Registry error types.

use thiserror::Error;

/// Errors surfaced at registration or lookup time.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Duplicate name or an empty I/O signature; surfaced before any task
    /// runs.
    #[error("registration conflict: {0}")]
    Conflict(String),

    #[error("not registered: {0}")]
    NotFound(String),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
