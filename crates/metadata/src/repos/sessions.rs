//! Upload session repository.

use crate::error::MetadataResult;
use crate::models::SessionRow;
use async_trait::async_trait;
use silo_core::SessionStatus;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for upload session rows.
///
/// The session store is the source of truth for lifecycle state; any
/// in-process cache in front of it is best-effort.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Insert a new session. Fails with `Conflict` if the ID already exists.
    async fn insert_session(&self, session: &SessionRow) -> MetadataResult<()>;

    /// Load a session by ID.
    async fn get_session(&self, session_id: Uuid) -> MetadataResult<Option<SessionRow>>;

    /// Atomically advance a session along the state machine.
    ///
    /// The update only applies when the current status is a legal source for
    /// `new_status`; otherwise it fails with `InvalidStateTransition` carrying
    /// the observed status. `updated_at` is written in the same statement.
    /// `final_path` must be provided exactly when transitioning to
    /// `Completed`.
    async fn update_status(
        &self,
        session_id: Uuid,
        new_status: SessionStatus,
        final_path: Option<&str>,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Atomically flip an `uploading` session to `assembling`.
    ///
    /// This is the completion concurrency guard: the single conditional
    /// write means exactly one of N concurrent completion calls observes
    /// `true`; the rest keep the session untouched and observe `false`.
    async fn begin_assembly(
        &self,
        session_id: Uuid,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Roll an `assembling` session back to `uploading`.
    ///
    /// Used when a completion call is refused for missing chunks after the
    /// assembling transition already happened. Returns `true` if a row was
    /// reverted.
    async fn revert_assembly(
        &self,
        session_id: Uuid,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// List non-terminal sessions whose `expires_at` lies before `now`.
    async fn list_expired(&self, now: OffsetDateTime, limit: u32)
    -> MetadataResult<Vec<SessionRow>>;
}
