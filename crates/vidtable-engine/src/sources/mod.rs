//! Built-in sources.

pub mod files;

pub use files::{register_builtin_sources, FilesSource};
