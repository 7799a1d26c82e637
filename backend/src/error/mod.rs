//! Centralized API error handling for AuthGate
//!
//! This module provides a unified error type for API responses with proper
//! HTTP status code mapping and JSON error responses. Server-side failures are
//! logged with their detail and answered with an opaque message.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{AuthError, RotationError};
use crate::store::StoreError;

/// Message returned to clients for every 5xx response
const INTERNAL_MESSAGE: &str = "Server error";

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) | ApiError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the client
    pub fn client_message(&self) -> &str {
        match self {
            ApiError::ValidationError(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m) => m,
            ApiError::InternalError(_) | ApiError::DatabaseError(_) => INTERNAL_MESSAGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(error = %self, code = %error_code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = %error_code, "Client error occurred");
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message: self.client_message().to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::DatabaseError(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        // The rejection text names the offending field; keep it out of the response
        tracing::debug!(error = %err.body_text(), "Request body rejected");
        ApiError::ValidationError("Invalid request body".to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingFields(msg) => ApiError::ValidationError(msg.to_string()),
            AuthError::EmailTaken => ApiError::ValidationError(err.to_string()),
            AuthError::InvalidCredentials => ApiError::ValidationError(err.to_string()),
            AuthError::UserNotFound => ApiError::NotFound(err.to_string()),
            AuthError::Rotation(e) => e.into(),
            AuthError::Store(e) => e.into(),
            AuthError::Password(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<RotationError> for ApiError {
    fn from(err: RotationError) -> Self {
        match err {
            RotationError::Store(e) => e.into(),
            RotationError::Signing(e) => ApiError::InternalError(e.to_string()),
            // Rejections share one message; the reason is only logged
            _ => ApiError::Forbidden("Invalid refresh token".to_string()),
        }
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtError;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            ApiError::ValidationError("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            ApiError::Unauthorized("test".to_string()).error_code(),
            "UNAUTHORIZED"
        );
        assert_eq!(
            ApiError::Forbidden("test".to_string()).error_code(),
            "FORBIDDEN"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::ValidationError("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Forbidden("test".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::DatabaseError("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = ApiError::DatabaseError("relation users does not exist".to_string());
        assert_eq!(err.client_message(), INTERNAL_MESSAGE);

        let err = ApiError::ValidationError("Invalid credentials".to_string());
        assert_eq!(err.client_message(), "Invalid credentials");
    }

    #[test]
    fn test_login_failures_are_indistinguishable() {
        let a: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(a.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(a.client_message(), "Invalid credentials");
    }

    #[test]
    fn test_rotation_rejections_map_to_forbidden() {
        let rejections = [
            RotationError::InvalidToken(JwtError::TokenExpired),
            RotationError::UnknownSubject,
            RotationError::NotActive,
            RotationError::Superseded,
        ];
        for rejection in rejections {
            let err: ApiError = rejection.into();
            assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        }

        let err: ApiError = RotationError::Store(StoreError::Database("down".into())).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
