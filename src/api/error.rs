//! API error types.
//!
//! Every error response has the body `{"error": "<message>"}`. Per-subscription
//! send failures are never API errors; they are reported inside a 200 response.

// Rust guideline compliant 2026-02

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::registry::RegistryError;

/// API error type.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Registration body missing, malformed, or without an endpoint.
    #[error("Invalid subscription data")]
    InvalidSubscription,

    /// Request body rejected for another reason.
    #[error("{0}")]
    BadRequest(String),

    /// Unexpected failure; the registry is left as it was.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidSubscription | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(_: RegistryError) -> Self {
        Self::InvalidSubscription
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidPayload => Self::BadRequest(err.to_string()),
            DispatchError::Serialization(_) => Self::Internal(err.to_string()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("[Api] {}", self);
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::InvalidSubscription.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::BadRequest("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_dispatch_error_mapping() {
        let invalid: ApiError = DispatchError::InvalidPayload.into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let serde_err = serde_json::from_str::<u8>("x").unwrap_err();
        let serialization: ApiError = DispatchError::Serialization(serde_err).into();
        assert_eq!(serialization.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_registry_error_mapping() {
        let err: ApiError = RegistryError::InvalidRecord("empty".to_string()).into();
        assert_eq!(err.to_string(), "Invalid subscription data");
    }
}
