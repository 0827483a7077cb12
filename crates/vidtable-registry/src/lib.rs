//! # vidtable-registry
//!
//! Process-wide registries mapping names to op, source, and sink factories
//! plus their I/O column signatures. Registration happens at process start
//! and conflicts surface there, before any task runs; afterwards the
//! registries are read-mostly and lock-free to query.

pub mod error;
pub mod registry;

pub use error::{RegistryError, Result};
pub use registry::{
    op_registry, sink_registry, source_registry, Kernel, KernelFactory, OpInfo, OpRegistry, Sink,
    SinkFactory, SinkInfo, SinkRegistry, Source, SourceFactory, SourceInfo, SourceRegistry,
};
