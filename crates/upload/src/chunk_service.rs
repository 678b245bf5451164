//! Idempotent chunk ingestion, ordered reassembly, and cleanup.

use crate::error::{UploadError, UploadResult};
use crate::sessions::Sessions;
use bytes::Bytes;
use silo_core::config::UploadConfig;
use silo_core::{SessionId, SessionStatus};
use silo_metadata::{ChunkRecordRow, MetadataStore, RememberOutcome, SessionRow};
use silo_storage::{ObjectStore, keys};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;

/// Outcome of a `store_chunk` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChunkOutcome {
    /// The chunk was durably stored by this call.
    Stored { size: u64 },
    /// An identical reservation already existed; nothing was written.
    AlreadyPresent { size: u64 },
}

impl StoreChunkOutcome {
    /// Recorded chunk size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Self::Stored { size } | Self::AlreadyPresent { size } => *size,
        }
    }

    /// Check whether this call performed the write.
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

/// Chunk ingestion and reassembly service.
///
/// Coordination happens entirely through the chunk index's conditional
/// write and the session store's transactional updates; the service itself
/// holds no locks.
pub struct ChunkService {
    storage: Arc<dyn ObjectStore>,
    index: Arc<dyn MetadataStore>,
    sessions: Arc<Sessions>,
    config: UploadConfig,
}

impl ChunkService {
    /// Create a chunk service.
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        index: Arc<dyn MetadataStore>,
        sessions: Arc<Sessions>,
        config: UploadConfig,
    ) -> Self {
        Self {
            storage,
            index,
            sessions,
            config,
        }
    }

    /// Accept one chunk payload, at most once per `(session_id, index)`.
    ///
    /// The chunk index reservation decides the winner among concurrent
    /// retries; only the winner writes bytes. A failed payload write rolls
    /// the reservation back so the operation stays retriable.
    #[instrument(skip(self, payload), fields(session_id = %session_id, size = payload.len()))]
    pub async fn store_chunk(
        &self,
        session_id: SessionId,
        index: u64,
        payload: Bytes,
    ) -> UploadResult<StoreChunkOutcome> {
        let session = self.sessions.load(session_id).await?;
        let status = session
            .session_status()
            .map_err(|e| UploadError::Internal(e.to_string()))?;
        if status.is_terminal() {
            return Err(UploadError::SessionTerminal { session_id, status });
        }
        let now = OffsetDateTime::now_utc();
        if session.is_expired(now) {
            return Err(UploadError::SessionExpired(session_id));
        }

        let geometry = session.geometry()?;
        if !geometry.contains_index(index) {
            return Err(UploadError::BadIndex {
                index,
                total_chunks: geometry.total_chunks(),
            });
        }
        let expected = geometry
            .expected_len(index)
            .ok_or(UploadError::BadIndex {
                index,
                total_chunks: geometry.total_chunks(),
            })?;
        if payload.len() as u64 != expected {
            return Err(UploadError::BadChunkSize {
                index,
                expected,
                actual: payload.len() as u64,
            });
        }

        let storage_key = keys::temp_chunk_key(&self.config.temp_prefix, session_id, index);
        let record = ChunkRecordRow {
            session_id: *session_id.as_uuid(),
            idx: index as i64,
            size_bytes: payload.len() as i64,
            stored_at: now,
            storage_key: storage_key.clone(),
        };

        match self.index.remember(&record).await? {
            RememberOutcome::AlreadyPresent(existing) => {
                tracing::debug!(session_id = %session_id, index, "duplicate chunk, reservation held");
                Ok(StoreChunkOutcome::AlreadyPresent {
                    size: existing.size_bytes as u64,
                })
            }
            RememberOutcome::Inserted => {
                if let Err(err) = self.storage.put(&storage_key, payload).await {
                    // Roll the reservation back so a retry can win it again.
                    if let Err(forget_err) =
                        self.index.forget(*session_id.as_uuid(), index).await
                    {
                        tracing::error!(
                            session_id = %session_id,
                            index,
                            error = %forget_err,
                            "failed to roll back chunk reservation after storage failure"
                        );
                    }
                    return Err(err.into());
                }

                if status == SessionStatus::Init {
                    self.mark_uploading(session_id).await;
                }

                Ok(StoreChunkOutcome::Stored { size: expected })
            }
        }
    }

    /// Request the `init -> uploading` transition after the first stored chunk.
    ///
    /// Concurrent first chunks race benignly (`uploading -> uploading` is a
    /// no-op); a session swept to `failed` in between just logs.
    async fn mark_uploading(&self, session_id: SessionId) {
        match self
            .sessions
            .transition(session_id, SessionStatus::Uploading, None)
            .await
        {
            Ok(()) => {}
            Err(UploadError::IllegalTransition { from, to }) => {
                tracing::debug!(session_id = %session_id, %from, %to, "uploading transition skipped");
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "uploading transition failed");
            }
        }
    }

    /// Accepted-vs-total chunk counts for a session.
    ///
    /// Session fields come from the cache; the accepted count is one
    /// authoritative index read.
    pub async fn progress(&self, session_id: SessionId) -> UploadResult<(u64, u64)> {
        let session = self.sessions.load(session_id).await?;
        let uploaded = self.index.count_chunks(session.session_id).await?;
        Ok((uploaded, session.total_chunks as u64))
    }

    /// Sorted list of indices still missing for a session.
    pub async fn missing(&self, session_id: SessionId) -> UploadResult<Vec<u64>> {
        let session = self.sessions.load(session_id).await?;
        self.missing_for(&session).await
    }

    /// Missing indices for an already-loaded session row.
    ///
    /// One index read; the gap set is the complement of the accepted set in
    /// `[0, total_chunks)`.
    pub async fn missing_for(&self, session: &SessionRow) -> UploadResult<Vec<u64>> {
        let have = self.index.indices(session.session_id).await?;
        let total = session.total_chunks as u64;

        let mut have_iter = have.into_iter().peekable();
        let mut gaps = Vec::new();
        for index in 0..total {
            if have_iter.peek() == Some(&index) {
                have_iter.next();
            } else {
                gaps.push(index);
            }
        }
        Ok(gaps)
    }

    /// Reassemble all chunks, in strict ascending index order, into the
    /// final object.
    ///
    /// Refuses when any chunk is missing. On failure the partially written
    /// final object is discarded; the session state is left to the caller.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn assemble(&self, session_id: SessionId) -> UploadResult<String> {
        let session = self.sessions.load(session_id).await?;

        let gaps = self.missing_for(&session).await?;
        if !gaps.is_empty() {
            return Err(UploadError::MissingChunks(gaps));
        }

        let final_key =
            keys::final_object_key(&self.config.final_prefix, session_id, &session.file_name);
        let mut writer = self.storage.put_stream(&final_key).await?;

        for index in 0..session.total_chunks as u64 {
            let data = match self.read_chunk(session_id, index).await {
                Ok(data) => data,
                Err(err) => {
                    self.abort_writer(writer, &final_key).await;
                    return Err(err);
                }
            };
            if let Err(err) = writer.write(data).await {
                self.abort_writer(writer, &final_key).await;
                return Err(err.into());
            }
        }

        let written = writer.finish().await?;
        tracing::info!(
            session_id = %session_id,
            final_key = %final_key,
            bytes = written,
            "assembled final object"
        );
        Ok(final_key)
    }

    async fn read_chunk(&self, session_id: SessionId, index: u64) -> UploadResult<Bytes> {
        // The record's storage key is authoritative; a cold index falls back
        // to the derived key so assembly survives an index rebuild gap.
        let key = match self.index.lookup(*session_id.as_uuid(), index).await? {
            Some(record) => record.storage_key,
            None => keys::temp_chunk_key(&self.config.temp_prefix, session_id, index),
        };
        Ok(self.storage.get(&key).await?)
    }

    async fn abort_writer(
        &self,
        writer: Box<dyn silo_storage::StreamingUpload>,
        final_key: &str,
    ) {
        if let Err(err) = writer.abort().await {
            tracing::warn!(final_key = %final_key, error = %err, "failed to abort partial final object");
        }
    }

    /// Delete the assembled object, used when verification fails after
    /// assembly succeeded.
    pub async fn discard_final(&self, final_key: &str) {
        if let Err(err) = self.storage.delete(final_key).await {
            tracing::warn!(final_key = %final_key, error = %err, "failed to delete final object");
        }
    }

    /// Remove every temporary chunk and forget the session's index entries.
    ///
    /// Best-effort and idempotent: errors are logged, never surfaced. The
    /// listing goes through the object store so records missing from the
    /// index are still removed.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn cleanup(&self, session_id: SessionId) {
        let prefix = keys::session_temp_prefix(&self.config.temp_prefix, session_id);
        match self.storage.list(&prefix).await {
            Ok(chunk_keys) => {
                for key in chunk_keys {
                    if let Err(err) = self.storage.delete(&key).await {
                        tracing::warn!(key = %key, error = %err, "failed to delete temp chunk");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "failed to list temp chunks");
            }
        }

        if let Err(err) = self.index.forget_all(*session_id.as_uuid()).await {
            tracing::warn!(session_id = %session_id, error = %err, "failed to clear chunk index");
        }
    }

    /// Rebuild the chunk index from the object store's temp prefix.
    ///
    /// The index is a cache of authoritative information; a cold index is
    /// reconstructed by listing stored chunks. Returns the number of records
    /// restored.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn rebuild_index(&self, session_id: SessionId) -> UploadResult<u64> {
        let session = self.sessions.load(session_id).await?;
        let prefix = keys::session_temp_prefix(&self.config.temp_prefix, session_id);
        let chunk_keys = self.storage.list(&prefix).await?;

        let mut restored = 0;
        for key in chunk_keys {
            let Some(index) = keys::parse_chunk_index(&key) else {
                tracing::warn!(key = %key, "foreign object under temp prefix, skipping");
                continue;
            };
            if index >= session.total_chunks as u64 {
                tracing::warn!(key = %key, index, "chunk index out of range, skipping");
                continue;
            }
            let meta = self.storage.head(&key).await?;
            let record = ChunkRecordRow {
                session_id: *session_id.as_uuid(),
                idx: index as i64,
                size_bytes: meta.size as i64,
                stored_at: OffsetDateTime::now_utc(),
                storage_key: key,
            };
            if self.index.remember(&record).await?.is_inserted() {
                restored += 1;
            }
        }
        Ok(restored)
    }
}
