//! HTTP API server for the image gallery.
//!
//! This crate provides:
//! - Authenticated image upload into blob storage and the record index
//! - Paginated and calendar listing of records
//! - Index/blob reconciliation: check, fix, reupload and delete-all
//! - Public blob serving for the local storage backends

pub mod auth;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod routes;
pub mod state;

pub use auth::{StaticTokenVerifier, TokenVerifier, TraceId};
pub use error::ApiError;
pub use fetcher::{HttpFetcher, RemoteFetcher};
pub use reconcile::Reconciler;
pub use routes::create_router;
pub use state::AppState;
