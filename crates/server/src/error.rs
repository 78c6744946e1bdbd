//! API error types and the response envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Successful response body: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Error response body: `{"success": false, "error": ..., "code": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Human-readable error message.
    pub error: String,
    /// Error code for programmatic handling.
    pub code: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidType(String),

    #[error("file exceeds maximum size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] gallery_storage::StorageError),

    #[error("index error: {0}")]
    Index(#[from] gallery_index::IndexError),
}

impl From<gallery_core::Error> for ApiError {
    fn from(e: gallery_core::Error) -> Self {
        use gallery_core::Error;
        match e {
            Error::InvalidType(msg) => Self::InvalidType(msg),
            Error::PayloadTooLarge { limit } => Self::PayloadTooLarge { limit },
            other @ Error::InvalidToken(_) => {
                Self::BadRequest(other.to_string())
            }
            Error::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::BadRequest(_) => "bad_request",
            Self::InvalidType(_) => "invalid_type",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
            Self::Storage(gallery_storage::StorageError::NotFound(_)) => "not_found",
            Self::Storage(_) => "storage_error",
            Self::Index(_) => "index_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::InvalidType(_) | Self::PayloadTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(e) => match e {
                gallery_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                gallery_storage::StorageError::InvalidPathname(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) | Self::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Backend details stay in the log.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
