//! API error types and the wire error envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use silo_metadata::MetadataError;
use silo_upload::UploadError;

/// Wire error envelope: `{"error": {"message", "code", "details?"}}`.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("completion refused: {} chunks missing", .0.len())]
    MissingChunks(Vec<u64>),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("structural validation failed: {0}")]
    Structural(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("service overloaded, retry later")]
    Backpressure,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Error code from the wire taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::MissingChunks(_) => "MISSING_CHUNKS",
            Self::DigestMismatch { .. } => "DIGEST_MISMATCH",
            Self::Structural(_) => "STRUCTURAL_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Backpressure => "BACKPRESSURE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::MissingChunks(_) => StatusCode::BAD_REQUEST,
            Self::DigestMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::Structural(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Backpressure => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::MissingChunks(gaps) => Some(serde_json::json!({ "missingChunks": gaps })),
            _ => None,
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(msg) => Self::Validation(msg),
            UploadError::BadIndex { .. } | UploadError::BadChunkSize { .. } => {
                Self::Validation(err.to_string())
            }
            UploadError::SessionNotFound(id) => {
                Self::NotFound(format!("upload session not found: {id}"))
            }
            UploadError::SessionExpired(_)
            | UploadError::SessionTerminal { .. }
            | UploadError::IllegalTransition { .. } => Self::Conflict(err.to_string()),
            UploadError::MissingChunks(gaps) => Self::MissingChunks(gaps),
            UploadError::DigestMismatch { expected, actual } => {
                Self::DigestMismatch { expected, actual }
            }
            UploadError::Structural(msg) => Self::Structural(msg),
            UploadError::Backpressure => Self::Backpressure,
            UploadError::Storage(e) => Self::Storage(e.to_string()),
            UploadError::Metadata(e) => match e {
                MetadataError::NotFound(msg) => Self::NotFound(msg),
                MetadataError::Conflict(msg) => Self::Conflict(msg),
                other => Self::Storage(other.to_string()),
            },
            UploadError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        crate::metrics::UPLOAD_ERRORS
            .with_label_values(&[self.code()])
            .inc();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorEnvelope {
            error: ErrorBody {
                message: self.to_string(),
                code: self.code().to_string(),
                details: self.details(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_chunks_carries_details() {
        let err = ApiError::MissingChunks(vec![3]);
        assert_eq!(err.code(), "MISSING_CHUNKS");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.details(),
            Some(serde_json::json!({ "missingChunks": [3] }))
        );
    }

    #[test]
    fn upload_errors_map_to_taxonomy() {
        let cases: Vec<(UploadError, &str, StatusCode)> = vec![
            (
                UploadError::Validation("bad".into()),
                "VALIDATION_ERROR",
                StatusCode::BAD_REQUEST,
            ),
            (
                UploadError::BadIndex {
                    index: 3,
                    total_chunks: 3,
                },
                "VALIDATION_ERROR",
                StatusCode::BAD_REQUEST,
            ),
            (
                UploadError::SessionNotFound(silo_core::SessionId::new()),
                "NOT_FOUND",
                StatusCode::NOT_FOUND,
            ),
            (
                UploadError::SessionExpired(silo_core::SessionId::new()),
                "CONFLICT",
                StatusCode::CONFLICT,
            ),
            (
                UploadError::IllegalTransition {
                    from: "completed".into(),
                    to: "assembling".into(),
                },
                "CONFLICT",
                StatusCode::CONFLICT,
            ),
            (
                UploadError::MissingChunks(vec![1, 2]),
                "MISSING_CHUNKS",
                StatusCode::BAD_REQUEST,
            ),
            (
                UploadError::DigestMismatch {
                    expected: "a".into(),
                    actual: "b".into(),
                },
                "DIGEST_MISMATCH",
                StatusCode::BAD_REQUEST,
            ),
            (
                UploadError::Structural("line 2".into()),
                "STRUCTURAL_ERROR",
                StatusCode::BAD_REQUEST,
            ),
            (
                UploadError::Backpressure,
                "BACKPRESSURE",
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (upload_err, code, status) in cases {
            let api_err = ApiError::from(upload_err);
            assert_eq!(api_err.code(), code);
            assert_eq!(api_err.status_code(), status);
        }
    }
}
