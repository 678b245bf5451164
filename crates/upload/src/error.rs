//! Error types for the upload services.

use silo_core::{SessionId, SessionStatus};
use silo_metadata::MetadataError;
use silo_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the chunk and upload services.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upload session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("upload session expired: {0}")]
    SessionExpired(SessionId),

    #[error("upload session {session_id} is {status}")]
    SessionTerminal {
        session_id: SessionId,
        status: SessionStatus,
    },

    #[error("illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("chunk index {index} out of range (total_chunks = {total_chunks})")]
    BadIndex { index: u64, total_chunks: u64 },

    #[error("chunk {index} has {actual} bytes, expected {expected}")]
    BadChunkSize {
        index: u64,
        expected: u64,
        actual: u64,
    },

    #[error("cannot assemble: {} chunks missing", .0.len())]
    MissingChunks(Vec<u64>),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("structural validation failed: {0}")]
    Structural(String),

    #[error("service overloaded, retry later")]
    Backpressure,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata error: {0}")]
    Metadata(MetadataError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<MetadataError> for UploadError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::Backpressure => Self::Backpressure,
            MetadataError::InvalidStateTransition { from, to } => {
                Self::IllegalTransition { from, to }
            }
            other => Self::Metadata(other),
        }
    }
}

impl From<silo_core::Error> for UploadError {
    fn from(err: silo_core::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result type for upload service operations.
pub type UploadResult<T> = std::result::Result<T, UploadError>;
