//! Authentication-related endpoints.

use crate::auth::require_auth;
use crate::error::{ApiResult, Envelope};
use axum::Json;
use axum::extract::Request;
use gallery_core::Role;
use serde::Serialize;

/// Response for the authenticated caller.
#[derive(Debug, Serialize)]
pub struct AuthCheckResponse {
    pub identity: String,
    pub role: Role,
}

/// GET /api/auth/check - Return the caller's identity and role.
pub async fn auth_check(req: Request) -> ApiResult<Json<Envelope<AuthCheckResponse>>> {
    let user = require_auth(&req)?;
    Ok(Envelope::ok(AuthCheckResponse {
        identity: user.identity.name.clone(),
        role: user.identity.role,
    }))
}
