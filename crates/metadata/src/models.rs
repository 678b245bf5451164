//! Database models mapping to the metadata schema.

use silo_core::{ChunkGeometry, SessionId, SessionStatus};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Upload session record.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub session_id: Uuid,
    pub owner_id: Option<String>,
    pub file_name: String,
    pub declared_size: i64,
    pub declared_type: String,
    /// Expected digest in `<algo>:<hex>` form, if the client supplied one.
    pub expected_digest: Option<String>,
    pub chunk_size: i64,
    pub total_chunks: i64,
    pub status: String,
    /// Non-null exactly when status is `completed`.
    pub final_path: Option<String>,
    /// Opaque JSON key/value bag forwarded downstream.
    pub metadata_json: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl SessionRow {
    /// Typed session ID.
    pub fn id(&self) -> SessionId {
        SessionId::from(self.session_id)
    }

    /// Typed lifecycle status.
    pub fn session_status(&self) -> silo_core::Result<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    /// Chunk geometry derived from the stored sizes.
    pub fn geometry(&self) -> silo_core::Result<ChunkGeometry> {
        ChunkGeometry::new(self.declared_size as u64, self.chunk_size as u64)
    }

    /// Check whether the session is past its expiry.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at < now
    }
}

/// One accepted chunk; keyed by `(session_id, idx)` and write-once.
#[derive(Debug, Clone, FromRow)]
pub struct ChunkRecordRow {
    pub session_id: Uuid,
    pub idx: i64,
    pub size_bytes: i64,
    pub stored_at: OffsetDateTime,
    /// Opaque locator used by the object store adapter.
    pub storage_key: String,
}
