//! Sink and source configuration carriers.
//!
//! External collaborators hand sinks and sources an opaque protobuf-encoded
//! `args` blob; the engine parses it into storage options. Empty args are
//! permitted and mean "all defaults".

/// Configuration passed to a sink factory at construction time.
#[derive(Debug, Clone, Default)]
pub struct SinkConfig {
    /// Protobuf-encoded arguments; empty is valid.
    pub args: Vec<u8>,
    /// Id of the node this sink runs on, for log attribution.
    pub node_id: i32,
}

/// Configuration passed to a source factory at construction time.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Protobuf-encoded arguments; empty is valid.
    pub args: Vec<u8>,
    /// Id of the node this source runs on, for log attribution.
    pub node_id: i32,
}
