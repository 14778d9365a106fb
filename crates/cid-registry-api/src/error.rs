//! API error handling
//!
//! Converts service errors into HTTP responses with appropriate status codes
//! and error messages.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cid_registry_service::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// API error type that can be converted to HTTP responses
#[derive(Debug)]
pub struct ApiError {
    status_code: StatusCode,
    message: String,
    error_code: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            error_code: None,
        }
    }

    /// Create an API error with an error code
    pub fn with_code(
        status_code: StatusCode,
        message: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            message: message.into(),
            error_code: Some(error_code.into()),
        }
    }

    /// Create a bad request error (400)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, message, "INVALID_INPUT")
    }

    /// Create a not found error (404)
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// Create a service unavailable error (503)
    pub fn service_unavailable(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::with_code(StatusCode::SERVICE_UNAVAILABLE, message, code)
    }

    /// Create an internal server error (500)
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_ERROR")
    }

    /// HTTP status of this error
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Machine-readable error code, if any
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status: u16,

    /// Error message
    pub error: String,

    /// Optional error code for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Timestamp of the error
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            error!(status = self.status_code.as_u16(), "{}", self.message);
        }

        let error_response = ErrorResponse {
            status: self.status_code.as_u16(),
            error: self.message,
            code: self.error_code,
            timestamp: chrono::Utc::now(),
        };

        (self.status_code, Json(error_response)).into_response()
    }
}

/// Convert ServiceError to ApiError
impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        match err {
            ServiceError::InvalidInput(msg) => {
                ApiError::with_code(StatusCode::BAD_REQUEST, msg, code)
            }
            ServiceError::NotFound(msg) => ApiError::with_code(StatusCode::NOT_FOUND, msg, code),
            ServiceError::UploadRejected(msg) => ApiError::with_code(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Upload rejected: {}", msg),
                code,
            ),
            ServiceError::StoreUnavailable(msg) => ApiError::service_unavailable(
                format!("Content store unavailable: {}", msg),
                code,
            ),
            ServiceError::PersistenceFailure(msg) => ApiError::service_unavailable(
                format!("Registration could not be persisted: {}", msg),
                code,
            ),
            ServiceError::Internal(msg) => ApiError::with_code(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", msg),
                code,
            ),
        }
    }
}

/// Malformed or incomplete JSON bodies get the same error shape as
/// every other failure
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::with_code(rejection.status(), rejection.body_text(), "INVALID_INPUT")
    }
}

/// JSON body extractor whose rejections render as [`ErrorResponse`]
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
