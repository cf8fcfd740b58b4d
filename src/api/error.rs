//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;
use crate::tracker::TrackerError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Rejected user input or missing entity
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Engine task is gone (shutting down)
    #[error("Service unavailable: {0}")]
    Engine(#[from] EngineError),

    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Tracker(e) => {
                let status = match e {
                    TrackerError::DevNotFound(_) | TrackerError::TokenNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    TrackerError::DuplicateAddress(_) | TrackerError::NotConnected => {
                        StatusCode::CONFLICT
                    }
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, e.code())
            }
            ApiError::Engine(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(request_id = %request_id, error_code = %code, error_message = %self, "API error occurred");
        } else {
            tracing::debug!(request_id = %request_id, error_code = %code, error_message = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_errors_map_to_client_statuses() {
        let cases = [
            (TrackerError::MissingField("Dev name"), StatusCode::BAD_REQUEST),
            (TrackerError::DevNotFound("1".to_string()), StatusCode::NOT_FOUND),
            (TrackerError::TokenNotFound("M".to_string()), StatusCode::NOT_FOUND),
            (TrackerError::DuplicateAddress("A".to_string()), StatusCode::CONFLICT),
            (TrackerError::InvalidImport("x".to_string()), StatusCode::BAD_REQUEST),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status_and_code().0, expected);
        }
    }

    #[test]
    fn test_stopped_engine_is_unavailable() {
        let (status, code) = ApiError::from(EngineError::Stopped).status_and_code();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "SERVICE_UNAVAILABLE");
    }
}
