use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("Failed to process image: {0}")]
    ProcessingError(String),

    #[error("Preprocessing failed: {0}")]
    PreprocessingError(String),

    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            OcrError::InitializationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INIT_ERROR"),
            OcrError::ProcessingError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESSING_ERROR"),
            OcrError::PreprocessingError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PREPROCESSING_ERROR")
            }
            OcrError::DecodeError(_) => (StatusCode::UNPROCESSABLE_ENTITY, "DECODE_ERROR"),
            OcrError::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT"),
            OcrError::FileTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
            OcrError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            OcrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OcrError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

/// Failure categories reported back to the credential pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Unauthorized,
    Transient,
}

/// Errors from the text-completion collaborator.
///
/// None of these reach an HTTP client: correction, merge and structure
/// detection all degrade to the uncorrected text instead.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Text completion is not configured")]
    NotConfigured,

    #[error("No API key available (all keys cooling down or disabled)")]
    NoCredential,

    #[error("Rate limited by completion provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Completion provider rejected the API key: {0}")]
    Unauthorized(String),

    #[error("Transient completion failure: {0}")]
    Transient(String),

    #[error("Invalid completion response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Category used when reporting the outcome to the key pool
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CompletionError::RateLimited { .. } => Some(FailureKind::RateLimited),
            CompletionError::Unauthorized(_) => Some(FailureKind::Unauthorized),
            CompletionError::Transient(_) => Some(FailureKind::Transient),
            _ => None,
        }
    }

    /// Whether another attempt (possibly with a different key) may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CompletionError::RateLimited { .. }
                | CompletionError::Unauthorized(_)
                | CompletionError::Transient(_)
        )
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CompletionError::InvalidResponse(err.to_string())
        } else {
            CompletionError::Transient(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let response = OcrError::MissingFile.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = OcrError::FileTooLarge { size: 10, max: 5 }.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let response = OcrError::DecodeError("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_completion_error_classification() {
        let limited = CompletionError::RateLimited { retry_after: None };
        assert_eq!(limited.failure_kind(), Some(FailureKind::RateLimited));
        assert!(limited.is_retryable());

        let invalid = CompletionError::InvalidResponse("no choices".to_string());
        assert_eq!(invalid.failure_kind(), None);
        assert!(!invalid.is_retryable());

        assert!(!CompletionError::NoCredential.is_retryable());
    }
}
