//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid session ID: {0}")]
    InvalidSessionId(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("unsupported digest algorithm: {0}")]
    UnsupportedDigestAlgorithm(String),

    #[error("invalid session status: {0}")]
    InvalidSessionStatus(String),

    #[error("invalid chunk geometry: declared_size={declared_size}, chunk_size={chunk_size}")]
    InvalidChunkGeometry { declared_size: u64, chunk_size: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
