//! Chunk index repository.

use crate::error::MetadataResult;
use crate::models::ChunkRecordRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Result of a conditional chunk-record write.
#[derive(Debug, Clone)]
pub enum RememberOutcome {
    /// The record was newly stored; the caller owns the payload write.
    Inserted,
    /// A record already existed; it is returned unchanged.
    AlreadyPresent(ChunkRecordRow),
}

impl RememberOutcome {
    /// Check whether this call won the reservation.
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Repository for chunk records.
///
/// `remember` is the sole idempotency primitive of the whole service: it is
/// atomic against concurrent callers for the same `(session_id, idx)` key,
/// so exactly one of N racing uploads observes `Inserted`.
#[async_trait]
pub trait ChunkIndexRepo: Send + Sync {
    /// Conditionally store a chunk record.
    ///
    /// If a record already exists for the key, it is returned unchanged and
    /// nothing is written.
    async fn remember(&self, record: &ChunkRecordRow) -> MetadataResult<RememberOutcome>;

    /// Look up a single chunk record.
    async fn lookup(&self, session_id: Uuid, idx: u64) -> MetadataResult<Option<ChunkRecordRow>>;

    /// Sorted list of accepted chunk indices for a session.
    async fn indices(&self, session_id: Uuid) -> MetadataResult<Vec<u64>>;

    /// Number of accepted chunks for a session.
    async fn count_chunks(&self, session_id: Uuid) -> MetadataResult<u64>;

    /// Remove a single chunk record (reservation rollback).
    async fn forget(&self, session_id: Uuid, idx: u64) -> MetadataResult<()>;

    /// Remove every chunk record for a session.
    async fn forget_all(&self, session_id: Uuid) -> MetadataResult<()>;
}
