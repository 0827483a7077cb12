//! Blob store handles: sequential write and random read.
//!
//! A [`BlobStore`] wraps an `object_store` backend and hands out
//! [`WriteHandle`]s (append, then `save()` as the durability point) and
//! [`RandomReadHandle`]s (ranged reads). Every round trip goes through the
//! retry policy; transient failures back off, terminal ones surface.

use crate::error::{Result, StoreError};
use crate::factory::build_object_store;
use crate::retry::{with_retry, RetryPolicy};
use crate::runtime::block_on;
use crate::StorageConfig;
use bytes::{Bytes, BytesMut};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;

/// A configured blob store backend plus its retry policy.
///
/// Cheap to clone; each worker thread builds its own instance so no handle
/// state is ever shared across workers.
#[derive(Clone)]
pub struct BlobStore {
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
}

impl BlobStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Build the backend described by `config`.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Ok(Self::new(build_object_store(config)?))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Open a sequential write handle at `path`.
    pub fn make_write_file(&self, path: &str) -> Result<WriteHandle> {
        Ok(WriteHandle {
            store: Arc::clone(&self.store),
            retry: self.retry.clone(),
            location: parse_path(path)?,
            path: path.to_string(),
            buf: BytesMut::new(),
            saved: false,
        })
    }

    /// Open a random read handle at `path`. Existence is checked lazily on
    /// the first read.
    pub fn make_read_file(&self, path: &str) -> Result<RandomReadHandle> {
        Ok(RandomReadHandle {
            store: Arc::clone(&self.store),
            retry: self.retry.clone(),
            location: parse_path(path)?,
            path: path.to_string(),
        })
    }

    /// One-shot whole-object write.
    pub fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let location = parse_path(path)?;
        block_on(with_retry(&self.retry, "put", || {
            let data = data.clone();
            let location = location.clone();
            async move {
                self.store
                    .put(&location, PutPayload::from(data))
                    .await
                    .map(|_| ())
                    .map_err(StoreError::from_object_store)
            }
        }))
    }

    /// One-shot whole-object read.
    pub fn get(&self, path: &str) -> Result<Bytes> {
        let location = parse_path(path)?;
        block_on(with_retry(&self.retry, "get", || {
            let location = location.clone();
            async move {
                let result = self
                    .store
                    .get(&location)
                    .await
                    .map_err(StoreError::from_object_store)?;
                result.bytes().await.map_err(StoreError::from_object_store)
            }
        }))
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        let location = parse_path(path)?;
        let head = block_on(with_retry(&self.retry, "head", || {
            let location = location.clone();
            async move {
                self.store
                    .head(&location)
                    .await
                    .map_err(StoreError::from_object_store)
            }
        }));
        match head {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete an object. Deleting a missing object is not an error.
    pub fn delete(&self, path: &str) -> Result<()> {
        let location = parse_path(path)?;
        let result = block_on(with_retry(&self.retry, "delete", || {
            let location = location.clone();
            async move {
                self.store
                    .delete(&location)
                    .await
                    .map_err(StoreError::from_object_store)
            }
        }));
        match result {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Rename an object. Atomic on posix; copy-then-delete on object stores.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_loc = parse_path(from)?;
        let to_loc = parse_path(to)?;
        block_on(with_retry(&self.retry, "rename", || {
            let from_loc = from_loc.clone();
            let to_loc = to_loc.clone();
            async move {
                self.store
                    .rename(&from_loc, &to_loc)
                    .await
                    .map_err(StoreError::from_object_store)
            }
        }))
    }
}

fn parse_path(path: &str) -> Result<ObjectPath> {
    ObjectPath::parse(path).map_err(|e| StoreError::Path(format!("{path}: {e}")))
}

/// Sequential-append write handle.
///
/// Appends accumulate in memory; `save()` uploads the object, flushes, and
/// closes the handle. After `save()` returns the bytes are durably visible
/// to subsequent reads. No intra-handle concurrent mutation.
pub struct WriteHandle {
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
    location: ObjectPath,
    path: String,
    buf: BytesMut,
    saved: bool,
}

impl WriteHandle {
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if self.saved {
            return Err(StoreError::Terminal(format!(
                "{}: append after save",
                self.path
            )));
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Append a little-endian fixed-width integer, the encoding used by the
    /// columnar metadata files.
    pub fn append_u64(&mut self, value: u64) -> Result<()> {
        self.append(&value.to_le_bytes())
    }

    /// Bytes appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Flush and close. Idempotent; the durability point for this object.
    pub fn save(&mut self) -> Result<()> {
        if self.saved {
            return Ok(());
        }
        let data = std::mem::take(&mut self.buf).freeze();
        block_on(with_retry(&self.retry, "save", || {
            let data = data.clone();
            let location = self.location.clone();
            let store = Arc::clone(&self.store);
            async move {
                store
                    .put(&location, PutPayload::from(data))
                    .await
                    .map(|_| ())
                    .map_err(StoreError::from_object_store)
            }
        }))?;
        self.saved = true;
        Ok(())
    }
}

/// Random-read handle over one object.
pub struct RandomReadHandle {
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
    location: ObjectPath,
    path: String,
}

impl RandomReadHandle {
    /// Read `len` bytes starting at `offset`.
    pub fn read_at(&self, offset: u64, len: u64) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        block_on(with_retry(&self.retry, "read_at", || {
            let location = self.location.clone();
            async move {
                self.store
                    .get_range(&location, offset..offset + len)
                    .await
                    .map_err(StoreError::from_object_store)
            }
        }))
    }

    /// Read the entire object.
    pub fn read_all(&self) -> Result<Bytes> {
        block_on(with_retry(&self.retry, "read_all", || {
            let location = self.location.clone();
            async move {
                let result = self
                    .store
                    .get(&location)
                    .await
                    .map_err(StoreError::from_object_store)?;
                result.bytes().await.map_err(StoreError::from_object_store)
            }
        }))
    }

    /// Object size in bytes.
    pub fn size(&self) -> Result<u64> {
        let meta = block_on(with_retry(&self.retry, "size", || {
            let location = self.location.clone();
            async move {
                self.store
                    .head(&location)
                    .await
                    .map_err(StoreError::from_object_store)
            }
        }))?;
        Ok(meta.size)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}
