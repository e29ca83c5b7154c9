//! Error types for the chat service

use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use bloxtrade_core::CoreError;

/// Service-level errors, mapped onto the HTTP taxonomy:
/// validation → 400, auth → 401/403, missing → 404, conflict → 409.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unexpected failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidId(_) | CoreError::Validation(_) | CoreError::LastAdmin(_) => {
                Self::BadRequest(e.to_string())
            }
            CoreError::ChatNotFound(_) | CoreError::MessageNotFound(_) => {
                Self::NotFound(e.to_string())
            }
            CoreError::NotParticipant(_)
            | CoreError::NotAdmin(_)
            | CoreError::PermissionDenied(_) => Self::Forbidden(e.to_string()),
            CoreError::Conflict(_) => Self::Conflict(e.to_string()),
            CoreError::Storage(_) | CoreError::Serialization(_) => Self::Internal(e.to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        match self {
            Self::Unauthorized(_) => HttpResponse::Unauthorized().json(body),
            Self::Forbidden(_) => HttpResponse::Forbidden().json(body),
            Self::NotFound(_) => HttpResponse::NotFound().json(body),
            Self::BadRequest(_) => HttpResponse::BadRequest().json(body),
            Self::Conflict(_) => HttpResponse::Conflict().json(body),
            Self::Internal(_) => HttpResponse::InternalServerError().json(body),
        }
    }
}
