//! In-process storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    BlobObject, BlobStore, ListingOptions, ListingPage, PutOptions, StoredBlob, join_url,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::instrument;

struct Entry {
    data: Bytes,
    content_type: Option<String>,
}

/// Blob store kept in memory; contents are lost when the process exits.
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, Entry>>,
    public_base_url: String,
}

impl MemoryBackend {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            public_base_url: public_base_url.into(),
        }
    }

    /// Remove an object. Used by tests to simulate blobs lost out of band.
    pub async fn remove(&self, pathname: &str) -> bool {
        self.objects.write().await.remove(pathname).is_some()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn validate(pathname: &str) -> StorageResult<()> {
    if pathname.is_empty() || pathname.starts_with('/') || pathname.split('/').any(|s| s == "..") {
        return Err(StorageError::InvalidPathname(pathname.to_string()));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for MemoryBackend {
    #[instrument(skip(self, data, options), fields(backend = "memory", size = data.len()))]
    async fn put(
        &self,
        pathname: &str,
        data: Bytes,
        options: PutOptions,
    ) -> StorageResult<StoredBlob> {
        validate(pathname)?;
        self.objects.write().await.insert(
            pathname.to_string(),
            Entry {
                data,
                content_type: options.content_type,
            },
        );
        Ok(StoredBlob {
            url: self.url_for(pathname),
            pathname: pathname.to_string(),
        })
    }

    async fn get(&self, pathname: &str) -> StorageResult<BlobObject> {
        validate(pathname)?;
        let objects = self.objects.read().await;
        let entry = objects
            .get(pathname)
            .ok_or_else(|| StorageError::NotFound(pathname.to_string()))?;
        Ok(BlobObject {
            data: entry.data.clone(),
            content_type: entry.content_type.clone(),
        })
    }

    async fn exists(&self, pathname: &str) -> StorageResult<bool> {
        validate(pathname)?;
        Ok(self.objects.read().await.contains_key(pathname))
    }

    async fn list(&self, prefix: &str, options: ListingOptions) -> StorageResult<ListingPage> {
        let objects = self.objects.read().await;
        let pathnames = objects
            .range(prefix.to_string()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .cloned();
        Ok(ListingPage::from_sorted(
            pathnames,
            options.normalized_limit(),
            |p| self.url_for(p),
        ))
    }

    fn url_for(&self, pathname: &str) -> String {
        join_url(&self.public_base_url, pathname)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
