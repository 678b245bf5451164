//! Core domain types and shared logic for the Silo upload service.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Upload session identifiers and lifecycle states
//! - Chunk geometry (index bounds, per-index sizes)
//! - Content digests for end-to-end integrity checks
//! - Wire types for the HTTP API
//! - Application configuration

pub mod api;
pub mod chunk;
pub mod config;
pub mod digest;
pub mod error;
pub mod session;

pub use chunk::ChunkGeometry;
pub use digest::{Digest, DigestAlgorithm, DigestHasher};
pub use error::{Error, Result};
pub use session::{SessionId, SessionStatus};

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Default maximum file size: 10 GiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024 * 1024;
