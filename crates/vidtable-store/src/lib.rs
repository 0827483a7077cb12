//! # vidtable-store
//!
//! Blob store abstraction for the vidtable engine.
//!
//! One API over posix, S3, and GCS via the `object_store` crate:
//! sequential-write handles whose `save()` is the durability point, and
//! random-read handles for ranged access into column data files. Transient
//! backend failures are retried with bounded exponential backoff; terminal
//! failures (permission, not-found, bad config) propagate to the caller.
//!
//! Workers are synchronous threads, so the public surface is synchronous;
//! the async backend is driven internally.

pub mod config;
pub mod error;
pub mod factory;
pub mod handles;
pub mod retry;

mod runtime;

pub use config::{StorageConfig, StorageKind};
pub use error::{Result, StoreError};
pub use factory::build_object_store;
pub use handles::{BlobStore, RandomReadHandle, WriteHandle};
pub use retry::RetryPolicy;
