//! Built-in sinks.

pub mod files;

pub use files::{register_builtin_sinks, FilesSink};
