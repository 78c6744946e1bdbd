//! Reconciliation and health endpoints.

use crate::auth::require_auth;
use crate::error::{ApiResult, Envelope};
use crate::reconcile::{CheckReport, DeleteAllReport, FixReport, Reconciler, ReuploadReport};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use serde::Serialize;

/// POST /api/check-images - Report records whose blob is missing.
pub async fn check_images(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Envelope<CheckReport>>> {
    require_auth(&req)?;
    let report = Reconciler::from_state(&state).check().await?;
    Ok(Envelope::ok(report))
}

/// POST /api/fix-images - Repair `-undefined-` urls and filenames.
pub async fn fix_images(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Envelope<FixReport>>> {
    require_auth(&req)?;
    let report = Reconciler::from_state(&state).fix().await?;
    Ok(Envelope::ok(report))
}

/// POST /api/reupload-images - Re-store missing blobs from their recorded url.
pub async fn reupload_images(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Envelope<ReuploadReport>>> {
    require_auth(&req)?;
    let report = Reconciler::from_state(&state).reupload().await?;
    Ok(Envelope::ok(report))
}

/// POST /api/delete-all-images - Delete every record and the image list.
pub async fn delete_all_images(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Envelope<DeleteAllReport>>> {
    let user = require_auth(&req)?;
    tracing::warn!(identity = %user.identity.name, "Deleting all image records");
    let report = Reconciler::from_state(&state).delete_all().await?;
    Ok(Envelope::ok(report))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /api/health - Health check.
pub async fn health_check(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<HealthResponse>>> {
    state.index.health_check().await?;
    state.storage.health_check().await?;

    Ok(Envelope::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
