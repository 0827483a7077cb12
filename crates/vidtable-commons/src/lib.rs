//! # vidtable-commons
//!
//! Shared types and utilities for the vidtable storage core.
//!
//! This crate provides the foundational data model used across all vidtable
//! crates (vidtable-store, vidtable-video, vidtable-engine, vidtable-registry):
//! typed frame buffers with block allocation, the element/column model that
//! batches travel in, table addressing, and the canonical on-disk path scheme.
//!
//! ## Type-Safe Identifiers
//!
//! Tables, columns, and items are addressed by `i32` ids wrapped in newtypes:
//! - `TableId`: identifies a logical table
//! - `ColumnId`: index of a column within a table
//! - `TaskId`: identifies an item (the partition unit of a table)

pub mod config;
pub mod device;
pub mod element;
pub mod errors;
pub mod frame;
pub mod ids;
pub mod paths;
pub mod profiler;

// Re-export commonly used types at crate root
pub use config::{SinkConfig, SourceConfig};
pub use device::{DeviceHandle, DeviceType, CPU_DEVICE};
pub use element::{move_if_different_address_space, ColumnType, Element};
pub use errors::{CommonError, Result};
pub use frame::{new_frame, new_frames, Frame, FrameInfo, FrameType, FRAME_DIMS};
pub use ids::{ColumnId, TableId, TaskId};
pub use profiler::Profiler;
