//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Request could not be decoded into engine input
    BadRequest(String),
    /// Engine-level outcome
    Engine(EngineError),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        AppError::Engine(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("VALIDATION", msg))
            }
            AppError::Engine(e) => match e {
                EngineError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, ApiError::new("VALIDATION", msg))
                }
                EngineError::LimitExceeded(msg) => {
                    (StatusCode::BAD_REQUEST, ApiError::new("LIMIT_EXCEEDED", msg))
                }
                EngineError::FieldInactive(id) => (
                    StatusCode::BAD_REQUEST,
                    ApiError::new("FIELD_INACTIVE", format!("field {id} is not accepting bookings")),
                ),
                EngineError::NotFound(id) => (
                    StatusCode::NOT_FOUND,
                    ApiError::new("NOT_FOUND", format!("not found: {id}")),
                ),
                EngineError::AlreadyExists(id) => (
                    StatusCode::CONFLICT,
                    ApiError::new("ALREADY_EXISTS", format!("already exists: {id}")),
                ),
                // Expected and frequent; the caller should re-query
                // availability and pick another slot. Not logged as an error.
                EngineError::Conflict(kind) => (
                    StatusCode::CONFLICT,
                    ApiError::new(kind.code(), kind.to_string()),
                ),
                EngineError::DuplicateSubmission(original) => (
                    StatusCode::CONFLICT,
                    ApiError::new(
                        "DUPLICATE_SUBMISSION",
                        "this submission was already accepted",
                    )
                    .with_details(original.to_string()),
                ),
                EngineError::WalError(e) => {
                    // Retryable, and deliberately not a 409: the slot is not
                    // known to be taken.
                    tracing::error!("storage failure: {e}");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        ApiError::new(
                            "STORAGE_UNAVAILABLE",
                            "could not commit the request, retry shortly",
                        ),
                    )
                }
            },
        };

        (status, Json(error)).into_response()
    }
}
