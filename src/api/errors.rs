use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::capture::CaptureError;

/// API error type with HTTP status code and message
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// Creates a new API error
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Creates a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Creates a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Creates a 409 Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Creates a 500 Internal Server Error
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<CaptureError> for ApiError {
    fn from(err: CaptureError) -> Self {
        let message = err.to_string();
        match err {
            CaptureError::UnknownField { .. } | CaptureError::UnknownOperation(_) => {
                Self::not_found(message)
            }
            CaptureError::Validation { .. } | CaptureError::Incomplete { .. } => {
                Self::bad_request(message)
            }
            CaptureError::AlreadyFinalized => Self::conflict(message),
            CaptureError::Persistence { .. }
            | CaptureError::Storage(_)
            | CaptureError::Configuration(_)
            | CaptureError::Json(_) => Self::internal_server_error(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_errors_map_to_statuses() {
        let cases = [
            (CaptureError::UnknownOperation("x".to_string()), StatusCode::NOT_FOUND),
            (
                CaptureError::Incomplete {
                    missing: vec!["size".to_string()],
                },
                StatusCode::BAD_REQUEST,
            ),
            (CaptureError::AlreadyFinalized, StatusCode::CONFLICT),
            (
                CaptureError::Persistence {
                    record_id: "ORD-1".to_string(),
                    reason: "disk full".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CaptureError::Storage("fraud_cases.json unreadable".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }
}
