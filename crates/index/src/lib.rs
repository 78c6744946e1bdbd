//! Key-value index store for the gallery.
//!
//! This crate provides:
//! - String values keyed by record id
//! - Ordered lists of keys, pushed at the head
//! - Backends: SQLite (sqlx) and in-memory

pub mod error;
pub mod memory;
pub mod repos;
pub mod store;

pub use error::{IndexError, IndexResult};
pub use memory::MemoryStore;
pub use repos::{KeyRepo, ListRepo};
pub use store::{IndexStore, SqliteStore};

use gallery_core::config::IndexConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Create an index store from configuration.
///
/// SQLite connections are retried with exponential backoff before giving up.
pub async fn from_config(config: &IndexConfig) -> IndexResult<Arc<dyn IndexStore>> {
    config.validate().map_err(IndexError::Config)?;

    match config {
        IndexConfig::Sqlite {
            path,
            connect_attempts,
            connect_backoff_ms,
        } => {
            let store = connect_with_retry(
                *connect_attempts,
                Duration::from_millis(*connect_backoff_ms),
                || SqliteStore::new(path),
            )
            .await?;
            Ok(Arc::new(store) as Arc<dyn IndexStore>)
        }
        IndexConfig::Memory => Ok(Arc::new(MemoryStore::new()) as Arc<dyn IndexStore>),
    }
}

/// Run `connect` until it succeeds or `attempts` are used up, doubling the delay each time.
pub async fn connect_with_retry<T, F, Fut>(
    attempts: u32,
    initial_backoff: Duration,
    mut connect: F,
) -> IndexResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = IndexResult<T>>,
{
    let attempts = attempts.max(1);
    let mut backoff = initial_backoff;
    let mut attempt = 1;
    loop {
        match connect().await {
            Ok(store) => return Ok(store),
            Err(e) if attempt >= attempts => {
                return Err(IndexError::ConnectExhausted {
                    attempts,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Index store connection failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                attempt += 1;
            }
        }
    }
}
