//! Common test fixtures for the upload services.

pub mod mocks;

use silo_core::api::InitUploadRequest;
use silo_core::config::{AiConfig, UploadConfig, ValidationConfig};
use silo_metadata::{MetadataStore, SessionRow, SqliteStore};
use silo_storage::{FilesystemBackend, ObjectStore};
use silo_upload::{AiHook, ChunkService, Sessions, UploadService, Validator};
use std::sync::Arc;
use tempfile::TempDir;

/// All services wired over temp-dir storage and a scratch SQLite store.
pub struct TestHarness {
    pub storage: Arc<dyn ObjectStore>,
    /// Concrete store handle for direct test surgery on rows.
    pub sqlite: Arc<SqliteStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub sessions: Arc<Sessions>,
    pub chunks: Arc<ChunkService>,
    pub uploads: Arc<UploadService>,
    pub config: UploadConfig,
    _temp: TempDir,
}

#[allow(dead_code)]
impl TestHarness {
    /// Harness with a tiny chunk size (4 bytes) for byte-literal scenarios.
    pub async fn new() -> Self {
        Self::with_chunk_size(4).await
    }

    pub async fn with_chunk_size(chunk_size: u64) -> Self {
        let temp = tempfile::tempdir().expect("temp dir");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(temp.path().join("storage"))
                .await
                .expect("storage backend"),
        );
        Self::build(temp, storage, chunk_size).await
    }

    /// Harness over a caller-provided storage backend (fault injection).
    pub async fn with_storage(storage: Arc<dyn ObjectStore>, chunk_size: u64) -> Self {
        let temp = tempfile::tempdir().expect("temp dir");
        Self::build(temp, storage, chunk_size).await
    }

    async fn build(temp: TempDir, storage: Arc<dyn ObjectStore>, chunk_size: u64) -> Self {
        let sqlite = Arc::new(
            SqliteStore::new(temp.path().join("metadata.db"), None)
                .await
                .expect("metadata store"),
        );
        let metadata: Arc<dyn MetadataStore> = sqlite.clone();

        let config = UploadConfig {
            chunk_size,
            ..Default::default()
        };

        let sessions = Arc::new(Sessions::new(metadata.clone()));
        let chunks = Arc::new(ChunkService::new(
            storage.clone(),
            metadata.clone(),
            sessions.clone(),
            config.clone(),
        ));
        let validator = Arc::new(Validator::new(ValidationConfig::default(), storage.clone()));
        let ai = Arc::new(AiHook::new(AiConfig::default()));
        let uploads = Arc::new(UploadService::new(
            sessions.clone(),
            chunks.clone(),
            validator,
            ai,
            config.clone(),
        ));

        Self {
            storage,
            sqlite,
            metadata,
            sessions,
            chunks,
            uploads,
            config,
            _temp: temp,
        }
    }

    /// Rewrite a session's expires_at to one hour in the past and drop its
    /// cache entry.
    pub async fn backdate_expiry(&self, session_id: silo_core::SessionId) {
        sqlx::query("UPDATE upload_sessions SET expires_at = ? WHERE session_id = ?")
            .bind(time::OffsetDateTime::now_utc() - time::Duration::hours(1))
            .bind(session_id.as_uuid())
            .execute(self.sqlite.pool())
            .await
            .expect("backdate expiry");
        self.sessions.invalidate(session_id);
    }

    /// Initialize a plain-text session.
    pub async fn init_text(&self, file_size: u64, checksum: Option<&str>) -> SessionRow {
        let request = InitUploadRequest {
            file_name: "hello.txt".to_string(),
            file_size,
            file_type: "text/plain".to_string(),
            checksum: checksum.map(String::from),
            metadata: None,
        };
        self.uploads
            .initialize(&request, None)
            .await
            .expect("initialize")
    }
}
