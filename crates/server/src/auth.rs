//! Authentication middleware and token verification.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use gallery_core::config::AuthConfig;
use gallery_core::token::{hash_token, normalize_token_hash};
use gallery_core::{Identity, Role};
use std::collections::HashMap;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, keeping printable ASCII only.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Turns a presented bearer token into a caller identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Returns None when the token is unknown.
    async fn verify(&self, token: &str) -> Option<Identity>;
}

/// Verifier backed by the SHA-256 token table from configuration.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    by_hash: HashMap<String, Identity>,
}

impl StaticTokenVerifier {
    pub fn from_config(config: &AuthConfig) -> gallery_core::Result<Self> {
        let mut by_hash = HashMap::with_capacity(config.tokens.len());
        for entry in &config.tokens {
            let hash = normalize_token_hash(&entry.token_hash)?;
            by_hash.insert(hash, Identity::new(entry.identity.clone(), entry.role));
        }
        Ok(Self { by_hash })
    }

    /// Add a raw token. Used by tests and tooling.
    pub fn with_token(mut self, token: &str, identity: &str, role: Role) -> Self {
        self.by_hash
            .insert(hash_token(token), Identity::new(identity, role));
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Option<Identity> {
        self.by_hash.get(&hash_token(token)).cloned()
    }
}

/// Authenticated request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub identity: Identity,
}

impl AuthenticatedUser {
    /// Require the admin role.
    pub fn require_admin(&self) -> ApiResult<()> {
        if self.identity.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin role required".to_string()))
        }
    }
}

/// Marker left by the middleware when a presented token did not verify.
#[derive(Clone, Copy, Debug)]
struct RejectedCredential;

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim())
            } else {
                None
            }
        })
        .filter(|t| !t.is_empty())
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Authentication middleware that verifies tokens and sets up trace context.
///
/// Requests without a valid token pass through unauthenticated; handlers
/// decide with [`require_auth`].
pub async fn auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    if let Some(token) = extract_bearer_token(&req) {
        match state.verifier.verify(token).await {
            Some(identity) => {
                req.extensions_mut().insert(AuthenticatedUser { identity });
            }
            None => {
                tracing::debug!(trace_id = %trace_id_str, "Bearer token did not verify");
                req.extensions_mut().insert(RejectedCredential);
            }
        }
    }

    next.run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await
}

/// Require authentication (a verified token must be present).
pub fn require_auth(req: &Request) -> ApiResult<&AuthenticatedUser> {
    if let Some(user) = req.extensions().get::<AuthenticatedUser>() {
        return Ok(user);
    }
    if req.extensions().get::<RejectedCredential>().is_some() {
        return Err(ApiError::Unauthorized("invalid or unknown token".to_string()));
    }
    Err(ApiError::Unauthorized("authentication required".to_string()))
}
