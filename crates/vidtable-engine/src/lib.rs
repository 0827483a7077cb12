//! # vidtable-engine
//!
//! The table-facing half of the vidtable storage core: the columnar file
//! layout, the save worker that turns evaluated batches into durable items,
//! and the load worker that opens items back up, feeding H.264 items through
//! a decoder and everything else through ranged reads.
//!
//! Workers run one per I/O thread and own their storage handles outright;
//! nothing here is shared between threads.

pub mod columns;
pub mod error;
pub mod load;
pub mod save;
pub mod sinks;
pub mod sources;
pub mod work;

pub use error::{EngineError, Result};
pub use load::{LoadWorker, LoadWorkerArgs, VideoStream};
pub use save::{SaveWorker, SaveWorkerArgs};
pub use sinks::{register_builtin_sinks, FilesSink};
pub use sources::{register_builtin_sources, FilesSource};
pub use work::WorkEntry;
