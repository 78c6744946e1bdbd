//! Application state shared across handlers.

use crate::auth::TokenVerifier;
use crate::fetcher::RemoteFetcher;
use gallery_core::config::AppConfig;
use gallery_index::IndexStore;
use gallery_storage::BlobStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Public blob storage.
    pub storage: Arc<dyn BlobStore>,
    /// Record index.
    pub index: Arc<dyn IndexStore>,
    /// HTTP client used by reupload to fetch missing images.
    pub fetcher: Arc<dyn RemoteFetcher>,
    /// Bearer token verification.
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn BlobStore>,
        index: Arc<dyn IndexStore>,
        fetcher: Arc<dyn RemoteFetcher>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        if config.auth.tokens.is_empty() {
            tracing::warn!("No auth tokens configured; every API call except health will be rejected");
        }

        Self {
            config: Arc::new(config),
            storage,
            index,
            fetcher,
            verifier,
        }
    }
}
