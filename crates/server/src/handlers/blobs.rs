//! Public blob serving for the local backends.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use gallery_core::media::mime_for_path;

/// Blob names are never reused, so responses can be cached indefinitely.
const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

/// GET /blobs/{*pathname} - Serve a stored object.
pub async fn get_blob(
    State(state): State<AppState>,
    Path(pathname): Path<String>,
) -> ApiResult<Response> {
    let object = state.storage.get(&pathname).await?;
    let content_type = object
        .content_type
        .unwrap_or_else(|| mime_for_path(&pathname).to_string());

    Ok((
        [(CONTENT_TYPE, content_type), (CACHE_CONTROL, IMMUTABLE_CACHE.to_string())],
        object.data,
    )
        .into_response())
}
