//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::accounts::AccountError;
use crate::core_state::CoreError;
use crate::pipeline::DiagnosticError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Diagnostic(#[from] DiagnosticError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid username or password".to_string(),
            ),
            ApiError::Forbidden(detail) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                detail.clone(),
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                detail.clone(),
            ),
            ApiError::Diagnostic(err) => diagnostic_parts(err),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                internal()
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL",
        "An internal error occurred".to_string(),
    )
}

fn diagnostic_parts(err: &DiagnosticError) -> (StatusCode, &'static str, String) {
    let status = match err {
        DiagnosticError::UnsupportedFormat(_) | DiagnosticError::InvalidInput(_) => {
            StatusCode::BAD_REQUEST
        }
        DiagnosticError::ImageDecode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DiagnosticError::NotFoundOrForbidden | DiagnosticError::BackingImageMissing(_) => {
            StatusCode::NOT_FOUND
        }
        DiagnosticError::Conflict(_) => StatusCode::CONFLICT,
        DiagnosticError::Inference(_)
        | DiagnosticError::MalformedPrediction(_)
        | DiagnosticError::ReportGeneration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DiagnosticError::Database(_) | DiagnosticError::Storage(_) => {
            tracing::error!(error = %err, "API internal error");
            return internal();
        }
    };

    if status.is_server_error() {
        tracing::error!(category = err.category(), error = %err, "Diagnostic pipeline failure");
    }
    let message = match err {
        // Report details can carry server paths.
        DiagnosticError::BackingImageMissing(_) => "Image for this test is missing".to_string(),
        other => other.to_string(),
    };
    (status, err.category(), message)
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidCredentials => ApiError::InvalidCredentials,
            AccountError::InvalidInput(msg) => DiagnosticError::InvalidInput(msg).into(),
            AccountError::Conflict(msg) => DiagnosticError::Conflict(msg).into(),
            AccountError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
