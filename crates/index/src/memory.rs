//! In-process index store.

use crate::error::IndexResult;
use crate::repos::{KeyRepo, ListRepo, resolve_range};
use crate::store::IndexStore;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    values: HashMap<String, String>,
    lists: HashMap<String, VecDeque<String>>,
}

/// Index store kept in memory; contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyRepo for MemoryStore {
    async fn get(&self, key: &str) -> IndexResult<Option<String>> {
        Ok(self.state.read().await.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> IndexResult<()> {
        self.state
            .write()
            .await
            .values
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> IndexResult<bool> {
        let mut state = self.state.write().await;
        let value = state.values.remove(key).is_some();
        let list = state.lists.remove(key).is_some();
        Ok(value || list)
    }
}

#[async_trait]
impl ListRepo for MemoryStore {
    async fn list_push(&self, key: &str, member: &str) -> IndexResult<u64> {
        let mut state = self.state.write().await;
        let list = state.lists.entry(key.to_string()).or_default();
        list.push_front(member.to_string());
        Ok(list.len() as u64)
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> IndexResult<Vec<String>> {
        let state = self.state.read().await;
        let Some(list) = state.lists.get(key) else {
            return Ok(Vec::new());
        };
        let Some((offset, count)) = resolve_range(list.len() as u64, start, stop) else {
            return Ok(Vec::new());
        };
        Ok(list
            .iter()
            .skip(offset as usize)
            .take(count as usize)
            .cloned()
            .collect())
    }

    async fn list_len(&self, key: &str) -> IndexResult<u64> {
        Ok(self
            .state
            .read()
            .await
            .lists
            .get(key)
            .map_or(0, |l| l.len() as u64))
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn insert_listed(&self, list_key: &str, key: &str, value: &str) -> IndexResult<u64> {
        let mut state = self.state.write().await;
        state.values.insert(key.to_string(), value.to_string());
        let list = state.lists.entry(list_key.to_string()).or_default();
        list.push_front(key.to_string());
        Ok(list.len() as u64)
    }

    async fn health_check(&self) -> IndexResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
