//! Image upload endpoint.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult, Envelope};
use crate::pipeline::{DeclaredFile, UploadPipeline};
use crate::state::AppState;
use axum::Json;
use axum::extract::{FromRequest, Multipart, Request, State};
use gallery_core::ImageRecord;
use gallery_core::media::mime_for_path;

/// Multipart field carrying the image.
const FILE_FIELD: &str = "file";

/// POST /api/upload - Store one image from the multipart `file` field.
pub async fn upload_image(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Envelope<ImageRecord>>> {
    let identity = require_auth(&req)?.identity.clone();

    let mut multipart = Multipart::from_request(req, &state)
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        // Clients that omit the part type get one guessed from the filename.
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .or_else(|| filename.as_deref().map(|f| mime_for_path(f).to_string()));

        let pipeline = UploadPipeline::new(
            state.storage.as_ref(),
            state.index.as_ref(),
            &state.config.upload,
        );
        let record = pipeline
            .upload(&identity, DeclaredFile { mime_type, filename }, field)
            .await?;
        return Ok(Envelope::ok(record));
    }

    Err(ApiError::BadRequest("no file uploaded".to_string()))
}
