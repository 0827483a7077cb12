//! Unified ObjectStore factory for all storage backends.
//!
//! Uses the `object_store` crate uniformly for local filesystem and cloud
//! storage; all backends come back as the same `Arc<dyn ObjectStore>`.

use crate::config::{StorageConfig, StorageKind};
use crate::error::{Result, StoreError};
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use std::sync::Arc;

/// Build an `ObjectStore` instance from a [`StorageConfig`].
pub fn build_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.kind {
        StorageKind::Posix => build_posix(config),
        StorageKind::S3 => build_s3(config),
        StorageKind::Gcs => build_gcs(config),
    }
}

fn build_posix(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    let path = &config.base_dir;

    // LocalFileSystem::new_with_prefix requires an absolute path that exists
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            StoreError::Config(format!(
                "failed to create storage directory '{}': {}",
                path.display(),
                e
            ))
        })?;
    }

    let absolute_path = path.canonicalize().map_err(|e| {
        StoreError::Config(format!(
            "failed to resolve absolute path for '{}': {}",
            path.display(),
            e
        ))
    })?;

    LocalFileSystem::new_with_prefix(absolute_path)
        .map(|fs| Arc::new(fs.with_automatic_cleanup(true)) as Arc<dyn ObjectStore>)
        .map_err(|e| StoreError::Config(format!("local filesystem: {e}")))
}

fn build_s3(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::from_env().with_bucket_name(&config.bucket);

    if let Some(ref region) = config.region {
        builder = builder.with_region(region);
    }
    if let Some(ref endpoint) = config.endpoint {
        builder = builder.with_endpoint(endpoint);
    }

    let store = builder
        .build()
        .map_err(|e| StoreError::Config(format!("s3: {e}")))?;
    Ok(Arc::new(store))
}

fn build_gcs(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(&config.bucket);

    if let Some(ref endpoint) = config.endpoint {
        builder = builder.with_url(endpoint.clone());
    }

    let store = builder
        .build()
        .map_err(|e| StoreError::Config(format!("gcs: {e}")))?;
    Ok(Arc::new(store))
}
