//! Storage backend configuration.
//!
//! Sinks and sources receive an opaque protobuf `args` blob; this module
//! decodes it into a [`StorageConfig`]. Empty args are valid and select the
//! posix backend rooted at the current directory.

use crate::error::{Result, StoreError};
use prost::Message;
use std::path::PathBuf;
use vidtable_proto::StorageArgs;

/// Which backend a [`StorageConfig`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Posix,
    S3,
    Gcs,
}

/// Parsed storage options for building a blob store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Root directory for the posix backend. Ignored by s3/gcs.
    pub base_dir: PathBuf,
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::posix(".")
    }
}

impl StorageConfig {
    /// Posix backend rooted at `base_dir`.
    pub fn posix(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind: StorageKind::Posix,
            base_dir: base_dir.into(),
            bucket: String::new(),
            region: None,
            endpoint: None,
        }
    }

    /// Decode sink/source args. Empty args select posix defaults.
    pub fn from_args(args: &[u8]) -> Result<Self> {
        if args.is_empty() {
            return Ok(Self::default());
        }
        let parsed = StorageArgs::decode(args)
            .map_err(|e| StoreError::Config(format!("could not parse storage args: {e}")))?;
        Self::from_storage_args(&parsed)
    }

    /// Build from an already-decoded [`StorageArgs`] message.
    pub fn from_storage_args(args: &StorageArgs) -> Result<Self> {
        let kind = match args.storage_type.as_str() {
            "" | "posix" => StorageKind::Posix,
            "s3" => StorageKind::S3,
            "gcs" => StorageKind::Gcs,
            other => {
                return Err(StoreError::Config(format!(
                    "unknown storage type '{other}'"
                )))
            }
        };

        let base_dir = if args.base_dir.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(&args.base_dir)
        };

        if matches!(kind, StorageKind::S3 | StorageKind::Gcs) && args.bucket.is_empty() {
            return Err(StoreError::Config(format!(
                "storage type '{}' requires a bucket",
                args.storage_type
            )));
        }

        let optional = |s: &String| {
            if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        };

        Ok(Self {
            kind,
            base_dir,
            bucket: args.bucket.clone(),
            region: optional(&args.region),
            endpoint: optional(&args.endpoint),
        })
    }
}
