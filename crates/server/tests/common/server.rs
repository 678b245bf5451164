//! Server test utilities.

use silo_core::config::{AppConfig, MetadataConfig, StorageConfig, UploadConfig};
use silo_metadata::{MetadataStore, SqliteStore};
use silo_server::{AppState, create_router};
use silo_storage::{FilesystemBackend, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server with a 4-byte chunk size for literal scenarios.
    pub async fn new() -> Self {
        Self::with_chunk_size(4).await
    }

    pub async fn with_chunk_size(chunk_size: u64) -> Self {
        let temp_dir = tempfile::tempdir().expect("temp directory");

        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("storage backend"),
        );

        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("metadata store"),
        );

        let config = AppConfig {
            storage: StorageConfig::Filesystem { path: storage_path },
            metadata: MetadataConfig::Sqlite {
                path: db_path,
                acquire_timeout_secs: 5,
            },
            upload: UploadConfig {
                chunk_size,
                ..Default::default()
            },
            ..Default::default()
        };

        let state = AppState::new(config, storage, metadata);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// The object storage backend.
    pub fn storage(&self) -> &Arc<dyn ObjectStore> {
        &self.state.storage
    }
}
