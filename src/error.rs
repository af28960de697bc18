use crate::moderation::ValidationResult;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Text rejected by the moderation word list.
    #[error("Content rejected: contains {} prohibited word(s)", .0.violations.len())]
    ContentRejected(ValidationResult),

    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is not allowed to perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable kind used in error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::ContentRejected(_) => "content_rejected",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::Io(_) | AppError::Pdf(_) | AppError::Config(_) | AppError::Internal(_) => {
                "internal"
            }
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::ContentRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        // Internal details stay in the log.
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": message,
        });

        if let AppError::ContentRejected(result) = &self {
            body["validation"] = json!(result);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
