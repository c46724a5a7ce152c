//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use reach_core::constants::{ERR_INTERNAL, ERR_METHOD_NOT_ALLOWED};
use reach_core::error::ReachError;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Method not allowed error.
    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, ERR_METHOD_NOT_ALLOWED)
    }

    /// Internal server error with the generic message.
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ERR_INTERNAL)
    }

    /// HTTP status of the error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Message shown to the caller.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error response body: `{"error": "...", "code": "ERR_400"}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Caller-facing message
    pub error: String,
    /// `ERR_` followed by the status code
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            code: format!("ERR_{}", self.status.as_u16()),
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<ReachError> for ApiError {
    fn from(err: ReachError) -> Self {
        match err {
            ReachError::Validation(message) => ApiError::bad_request(message),
            other => {
                tracing::error!(error = %other, "Request failed");
                ApiError::internal()
            }
        }
    }
}
