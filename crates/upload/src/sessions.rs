//! Cache-through access to the session store.

use crate::error::{UploadError, UploadResult};
use dashmap::DashMap;
use silo_core::{SessionId, SessionStatus};
use silo_metadata::{MetadataStore, SessionRow};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Session lookup with a best-effort in-process cache.
///
/// The store is the source of truth; the cache only short-circuits reads of
/// session fields. Every status transition invalidates the entry, so stale
/// state is never used for a lifecycle decision.
pub struct Sessions {
    store: Arc<dyn MetadataStore>,
    cache: DashMap<Uuid, SessionRow>,
}

impl Sessions {
    /// Create a session accessor over `store`.
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// The underlying metadata store.
    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Insert a new session row and warm the cache.
    pub async fn insert(&self, session: &SessionRow) -> UploadResult<()> {
        self.store.insert_session(session).await?;
        self.cache.insert(session.session_id, session.clone());
        Ok(())
    }

    /// Load a session, serving from the cache when possible.
    pub async fn load(&self, session_id: SessionId) -> UploadResult<SessionRow> {
        if let Some(cached) = self.cache.get(session_id.as_uuid()) {
            return Ok(cached.clone());
        }
        self.load_uncached(session_id).await
    }

    /// Load a session straight from the store, refreshing the cache.
    pub async fn load_uncached(&self, session_id: SessionId) -> UploadResult<SessionRow> {
        let row = self
            .store
            .get_session(*session_id.as_uuid())
            .await?
            .ok_or(UploadError::SessionNotFound(session_id))?;
        self.cache.insert(row.session_id, row.clone());
        Ok(row)
    }

    /// Drop the cache entry for a session.
    pub fn invalidate(&self, session_id: SessionId) {
        self.cache.remove(session_id.as_uuid());
    }

    /// Advance a session along the state machine, invalidating the cache.
    pub async fn transition(
        &self,
        session_id: SessionId,
        new_status: SessionStatus,
        final_path: Option<&str>,
    ) -> UploadResult<()> {
        let result = self
            .store
            .update_status(
                *session_id.as_uuid(),
                new_status,
                final_path,
                OffsetDateTime::now_utc(),
            )
            .await;
        self.invalidate(session_id);
        result.map_err(UploadError::from)
    }

    /// Conditionally flip `uploading` to `assembling`; true for the winner.
    pub async fn begin_assembly(&self, session_id: SessionId) -> UploadResult<bool> {
        let result = self
            .store
            .begin_assembly(*session_id.as_uuid(), OffsetDateTime::now_utc())
            .await;
        self.invalidate(session_id);
        result.map_err(UploadError::from)
    }

    /// Roll an `assembling` session back to `uploading`.
    pub async fn revert_assembly(&self, session_id: SessionId) -> UploadResult<bool> {
        let result = self
            .store
            .revert_assembly(*session_id.as_uuid(), OffsetDateTime::now_utc())
            .await;
        self.invalidate(session_id);
        result.map_err(UploadError::from)
    }

    /// List non-terminal sessions past their expiry.
    pub async fn list_expired(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> UploadResult<Vec<SessionRow>> {
        Ok(self.store.list_expired(now, limit).await?)
    }
}
