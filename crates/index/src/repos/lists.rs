//! Ordered list repository.

use crate::error::IndexResult;
use async_trait::async_trait;

/// Repository for ordered lists of strings stored under a key.
#[async_trait]
pub trait ListRepo: Send + Sync {
    /// Push a member to the head of the list, creating it if needed.
    ///
    /// Returns the new list length.
    async fn list_push(&self, key: &str, member: &str) -> IndexResult<u64>;

    /// Members between `start` and `stop`, both inclusive.
    ///
    /// Negative indexes count from the tail (`-1` is the last member), so
    /// `list_range(key, 0, -1)` returns the whole list. Out-of-range bounds
    /// are clamped; a missing list is empty.
    async fn list_range(&self, key: &str, start: i64, stop: i64) -> IndexResult<Vec<String>>;

    /// Number of members in the list.
    async fn list_len(&self, key: &str) -> IndexResult<u64>;
}

/// Translate inclusive, possibly negative bounds into `(offset, count)`.
///
/// Returns None when the range selects nothing.
pub fn resolve_range(len: u64, start: i64, stop: i64) -> Option<(u64, u64)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as u64, (stop - start + 1) as u64))
}
