//! Blob storage abstraction and backends for the gallery.
//!
//! This crate provides:
//! - The [`BlobStore`] trait: put, get and bounded prefix listing of public objects
//! - Backends: local filesystem and in-memory

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, memory::MemoryBackend};
pub use error::{StorageError, StorageResult};
pub use traits::{
    BlobEntry, BlobObject, BlobStore, ListingOptions, ListingPage, PutOptions, StoredBlob,
};

use gallery_core::config::StorageConfig;
use std::sync::Arc;

/// Create a blob store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem {
            path,
            public_base_url,
        } => {
            let backend = FilesystemBackend::new(path, public_base_url.clone()).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::Memory { public_base_url } => {
            Ok(Arc::new(MemoryBackend::new(public_base_url.clone())))
        }
    }
}
