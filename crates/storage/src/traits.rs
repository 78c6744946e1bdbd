//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Upper bound on the number of entries a single listing returns.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Options applied when storing an object.
#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    /// Content type served with the object.
    pub content_type: Option<String>,
}

impl PutOptions {
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
        }
    }
}

/// Location of an object after a successful put.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    /// Public URL the object resolves under.
    pub url: String,
    /// Object path inside the store.
    pub pathname: String,
}

/// An object read back from the store.
#[derive(Clone, Debug)]
pub struct BlobObject {
    pub data: Bytes,
    /// Content type recorded at put time, if the backend keeps one.
    pub content_type: Option<String>,
}

/// One entry of a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobEntry {
    pub url: String,
    pub pathname: String,
}

/// Options for listing operations.
#[derive(Clone, Debug)]
pub struct ListingOptions {
    /// Maximum number of entries to return, clamped to `1..=MAX_LIST_LIMIT`.
    pub limit: usize,
}

impl ListingOptions {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn normalized_limit(&self) -> usize {
        self.limit.clamp(1, MAX_LIST_LIMIT)
    }
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self { limit: 100 }
    }
}

/// A single bounded listing.
///
/// Entries are sorted by pathname. `has_more` is set when entries past the
/// limit were left out.
#[derive(Clone, Debug, Default)]
pub struct ListingPage {
    pub blobs: Vec<BlobEntry>,
    pub has_more: bool,
}

impl ListingPage {
    /// Build a page from every matching pathname, keeping the first `limit` in order.
    pub(crate) fn from_sorted(
        pathnames: impl IntoIterator<Item = String>,
        limit: usize,
        url_for: impl Fn(&str) -> String,
    ) -> Self {
        let mut blobs = Vec::with_capacity(limit.min(64));
        let mut has_more = false;
        for pathname in pathnames {
            if blobs.len() == limit {
                has_more = true;
                break;
            }
            blobs.push(BlobEntry {
                url: url_for(&pathname),
                pathname,
            });
        }
        Self { blobs, has_more }
    }
}

/// Public object storage for uploaded images.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store an object, replacing any previous object at the same pathname.
    async fn put(&self, pathname: &str, data: Bytes, options: PutOptions)
    -> StorageResult<StoredBlob>;

    /// Read an object back.
    async fn get(&self, pathname: &str) -> StorageResult<BlobObject>;

    /// Check if an object exists.
    async fn exists(&self, pathname: &str) -> StorageResult<bool>;

    /// List objects whose pathname starts with `prefix`, bounded by the limit.
    async fn list(&self, prefix: &str, options: ListingOptions) -> StorageResult<ListingPage>;

    /// Public URL for a pathname.
    fn url_for(&self, pathname: &str) -> String;

    /// Static identifier for the backend type, used for logging and metrics.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend availability. Called once at startup.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Join a public base URL and a pathname.
pub(crate) fn join_url(base: &str, pathname: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), pathname.trim_start_matches('/'))
}
