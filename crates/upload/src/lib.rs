//! Chunk ingestion, reassembly, validation, and session orchestration.
//!
//! This crate holds the subsystem that must stay correct under partial
//! failure and concurrent retries:
//! - [`ChunkService`]: idempotent chunk acceptance, ordered reassembly,
//!   best-effort cleanup, index rebuild
//! - [`UploadService`]: session lifecycle, completion orchestration,
//!   expiry sweep
//! - [`Validator`]: type/size gating, digest and structural verification
//! - [`AiHook`]: fire-and-forget downstream handoff
//!
//! There are no in-process locks anywhere in this crate: coordination is
//! delegated to the chunk index's conditional write and the session store's
//! transactional updates.

pub mod ai;
pub mod chunk_service;
pub mod error;
pub mod sessions;
pub mod upload_service;
pub mod validator;

pub use ai::{AiHook, AiJobRef, AiPurpose};
pub use chunk_service::{ChunkService, StoreChunkOutcome};
pub use error::{UploadError, UploadResult};
pub use sessions::Sessions;
pub use upload_service::{CompleteOutcome, StatusReport, UploadService};
pub use validator::Validator;
