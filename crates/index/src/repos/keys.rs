//! Plain key/value repository.

use crate::error::IndexResult;
use async_trait::async_trait;

/// Repository for string values stored under a key.
#[async_trait]
pub trait KeyRepo: Send + Sync {
    /// Get the value stored under a key.
    async fn get(&self, key: &str) -> IndexResult<Option<String>>;

    /// Store a value, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> IndexResult<()>;

    /// Delete a key of any kind (value or list).
    ///
    /// Returns true if something was removed.
    async fn delete(&self, key: &str) -> IndexResult<bool>;
}
