//! Session creation, state transitions, expiry, and completion orchestration.

use crate::ai::{AiHook, AiJobRef};
use crate::chunk_service::ChunkService;
use crate::error::{UploadError, UploadResult};
use crate::sessions::Sessions;
use crate::validator::Validator;
use silo_core::api::InitUploadRequest;
use silo_core::config::UploadConfig;
use silo_core::{ChunkGeometry, SessionId, SessionStatus};
use silo_metadata::SessionRow;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;

/// Batch size for expiry sweep queries.
const SWEEP_BATCH: u32 = 500;

/// Point-in-time view of a session returned by `status`.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub session: SessionRow,
    pub uploaded: u64,
    pub missing: Vec<u64>,
}

/// Result of a successful completion call.
#[derive(Debug, Clone)]
pub struct CompleteOutcome {
    pub final_path: String,
    pub ai_job: AiJobRef,
}

/// Upload session orchestration.
pub struct UploadService {
    sessions: Arc<Sessions>,
    chunks: Arc<ChunkService>,
    validator: Arc<Validator>,
    ai: Arc<AiHook>,
    config: UploadConfig,
}

impl UploadService {
    /// Create the upload service.
    pub fn new(
        sessions: Arc<Sessions>,
        chunks: Arc<ChunkService>,
        validator: Arc<Validator>,
        ai: Arc<AiHook>,
        config: UploadConfig,
    ) -> Self {
        Self {
            sessions,
            chunks,
            validator,
            ai,
            config,
        }
    }

    /// Create a new upload session in `init`.
    #[instrument(skip(self, request), fields(file_name = %request.file_name, file_size = request.file_size))]
    pub async fn initialize(
        &self,
        request: &InitUploadRequest,
        owner_id: Option<String>,
    ) -> UploadResult<SessionRow> {
        let digest = self.validator.validate_request(
            &request.file_name,
            &request.file_type,
            request.file_size,
            self.config.max_file_size,
            request.checksum.as_deref(),
        )?;

        let geometry = ChunkGeometry::new(request.file_size, self.config.chunk_size)?;
        let session_id = SessionId::new();
        let now = OffsetDateTime::now_utc();

        let session = SessionRow {
            session_id: *session_id.as_uuid(),
            owner_id,
            file_name: request.file_name.clone(),
            declared_size: request.file_size as i64,
            declared_type: request.file_type.clone(),
            expected_digest: digest.map(|d| d.to_string()),
            chunk_size: self.config.chunk_size as i64,
            total_chunks: geometry.total_chunks() as i64,
            status: SessionStatus::Init.as_str().to_string(),
            final_path: None,
            metadata_json: request.metadata.as_ref().map(|v| v.to_string()),
            created_at: now,
            updated_at: now,
            expires_at: now + self.config.session_ttl(),
        };

        self.sessions.insert(&session).await?;
        tracing::info!(
            session_id = %session_id,
            total_chunks = session.total_chunks,
            "created upload session"
        );
        Ok(session)
    }

    /// Report session fields plus uploaded/missing chunk counts.
    ///
    /// Session fields come from the cache when warm; the gap list derives
    /// from one authoritative index read.
    pub async fn status(&self, session_id: SessionId) -> UploadResult<StatusReport> {
        let session = self.sessions.load(session_id).await?;
        let missing = self.chunks.missing_for(&session).await?;
        let uploaded = session.total_chunks as u64 - missing.len() as u64;
        Ok(StatusReport {
            session,
            uploaded,
            missing,
        })
    }

    /// Advance a session along the state machine.
    pub async fn transition(
        &self,
        session_id: SessionId,
        new_status: SessionStatus,
        final_path: Option<&str>,
    ) -> UploadResult<()> {
        self.sessions
            .transition(session_id, new_status, final_path)
            .await
    }

    /// Orchestrate completion: assemble, verify, finalize, hand off, clean up.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn complete(&self, session_id: SessionId) -> UploadResult<CompleteOutcome> {
        let session = self.sessions.load_uncached(session_id).await?;
        let status = session
            .session_status()
            .map_err(|e| UploadError::Internal(e.to_string()))?;

        if session.is_expired(OffsetDateTime::now_utc()) {
            return Err(UploadError::SessionExpired(session_id));
        }

        match status {
            SessionStatus::Uploading => {
                // The conditional flip is the concurrency guard: exactly one
                // caller wins; the rest observe an illegal transition.
                if !self.sessions.begin_assembly(session_id).await? {
                    return Err(UploadError::IllegalTransition {
                        from: SessionStatus::Assembling.as_str().to_string(),
                        to: SessionStatus::Assembling.as_str().to_string(),
                    });
                }
            }
            // A session stuck in assembling (cancelled assemble) may retry.
            SessionStatus::Assembling => {}
            other => {
                return Err(UploadError::IllegalTransition {
                    from: other.as_str().to_string(),
                    to: SessionStatus::Assembling.as_str().to_string(),
                });
            }
        }

        let final_path = match self.chunks.assemble(session_id).await {
            Ok(path) => path,
            Err(UploadError::MissingChunks(gaps)) => {
                self.check_lost_to_concurrent_complete(session_id).await?;
                // Roll the assembling flip back so chunk uploads can resume.
                if let Err(err) = self.sessions.revert_assembly(session_id).await {
                    tracing::error!(session_id = %session_id, error = %err, "assembly rollback failed");
                }
                return Err(UploadError::MissingChunks(gaps));
            }
            Err(err) => {
                self.check_lost_to_concurrent_complete(session_id).await?;
                self.fail_session(session_id).await;
                return Err(err);
            }
        };

        if let Err(err) = self.validator.verify(&session, &final_path).await {
            self.check_lost_to_concurrent_complete(session_id).await?;
            self.chunks.discard_final(&final_path).await;
            self.fail_session(session_id).await;
            return Err(err);
        }

        self.sessions
            .transition(session_id, SessionStatus::Completed, Some(&final_path))
            .await?;

        let ai_job = self.ai.submit(&session, &final_path);
        self.spawn_cleanup(session_id);

        tracing::info!(session_id = %session_id, final_path = %final_path, "upload completed");
        Ok(CompleteOutcome { final_path, ai_job })
    }

    /// Fail every non-terminal session past its expiry, deleting its chunks
    /// first. Per-session errors are logged and do not abort the sweep.
    /// Returns the number of sessions swept.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, now: OffsetDateTime) -> UploadResult<u64> {
        let mut swept = 0;
        loop {
            let batch = self.sessions.list_expired(now, SWEEP_BATCH).await?;
            if batch.is_empty() {
                break;
            }
            let mut progressed = false;
            for session in batch {
                let session_id = session.id();
                self.chunks.cleanup(session_id).await;
                match self
                    .sessions
                    .transition(session_id, SessionStatus::Failed, None)
                    .await
                {
                    Ok(()) => {
                        swept += 1;
                        progressed = true;
                        tracing::info!(session_id = %session_id, "expired session failed and cleaned");
                    }
                    Err(err) => {
                        tracing::warn!(session_id = %session_id, error = %err, "expiry sweep transition failed");
                    }
                }
            }
            // A batch where nothing transitioned would re-list the same
            // sessions forever; leave them for the next sweep run.
            if !progressed {
                break;
            }
        }
        Ok(swept)
    }

    /// Detect a retry that lost to a concurrent completion.
    ///
    /// A retry entering `assembling` can hit phantom gaps or read failures
    /// once the winner's cleanup deletes the temp chunks. The session is
    /// already `completed` then, so report the conflict instead of failing
    /// a finished upload.
    async fn check_lost_to_concurrent_complete(&self, session_id: SessionId) -> UploadResult<()> {
        if let Ok(current) = self.sessions.load_uncached(session_id).await
            && current.status == SessionStatus::Completed.as_str()
        {
            return Err(UploadError::IllegalTransition {
                from: SessionStatus::Completed.as_str().to_string(),
                to: SessionStatus::Assembling.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Transition a session to `failed` and schedule chunk cleanup.
    async fn fail_session(&self, session_id: SessionId) {
        if let Err(err) = self
            .sessions
            .transition(session_id, SessionStatus::Failed, None)
            .await
        {
            tracing::error!(session_id = %session_id, error = %err, "failed-state transition failed");
        }
        self.spawn_cleanup(session_id);
    }

    fn spawn_cleanup(&self, session_id: SessionId) {
        let chunks = self.chunks.clone();
        tokio::spawn(async move {
            chunks.cleanup(session_id).await;
        });
    }
}
