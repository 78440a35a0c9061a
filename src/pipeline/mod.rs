//! Diagnostic test pipeline: decode, classify, aggregate, persist.

pub mod aggregate;
pub mod classifier;
pub mod image_store;
pub mod preprocess;
pub mod processor;

use thiserror::Error;

use crate::db::DatabaseError;

/// Pipeline failures. Each variant maps to a stable category code that the
/// HTTP layer exposes unchanged.
#[derive(Error, Debug)]
pub enum DiagnosticError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image could not be decoded: {0}")]
    ImageDecode(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Malformed prediction: {0}")]
    MalformedPrediction(String),

    /// Missing and inaccessible records are deliberately the same error.
    #[error("Record not found")]
    NotFoundOrForbidden,

    #[error("Report generation failed: {0}")]
    ReportGeneration(String),

    /// The stored image a report needs is gone from disk.
    #[error("Backing image missing: {0}")]
    BackingImageMissing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl DiagnosticError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::ImageDecode(_) => "IMAGE_DECODE",
            Self::Inference(_) => "INFERENCE",
            Self::MalformedPrediction(_) => "MALFORMED_PREDICTION",
            Self::NotFoundOrForbidden => "NOT_FOUND",
            Self::ReportGeneration(_) | Self::BackingImageMissing(_) => "REPORT_GENERATION",
            Self::InvalidInput(_) => "VALIDATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) | Self::Storage(_) => "INTERNAL",
        }
    }
}

impl From<DatabaseError> for DiagnosticError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConstraintViolation(msg) => Self::Conflict(msg),
            other => Self::Database(other),
        }
    }
}

impl From<rusqlite::Error> for DiagnosticError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}
