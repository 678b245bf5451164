//! Application state shared across handlers.

use silo_core::config::AppConfig;
use silo_metadata::MetadataStore;
use silo_storage::ObjectStore;
use silo_upload::{AiHook, ChunkService, Sessions, UploadService, Validator};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Metadata store (sessions + chunk index).
    pub metadata: Arc<dyn MetadataStore>,
    /// Chunk ingestion and reassembly service.
    pub chunks: Arc<ChunkService>,
    /// Upload session orchestration.
    pub uploads: Arc<UploadService>,
    /// Server start time, for the health endpoint.
    pub started_at: Instant,
}

impl AppState {
    /// Create a new application state, wiring all services.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid; validation errors must stop
    /// the process before it accepts traffic.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        if let Err(error) = config.validate() {
            panic!("invalid configuration: {error}");
        }

        let sessions = Arc::new(Sessions::new(metadata.clone()));
        let chunks = Arc::new(ChunkService::new(
            storage.clone(),
            metadata.clone(),
            sessions.clone(),
            config.upload.clone(),
        ));
        let validator = Arc::new(Validator::new(config.validation.clone(), storage.clone()));
        let ai = Arc::new(AiHook::new(config.ai.clone()));
        let uploads = Arc::new(UploadService::new(
            sessions,
            chunks.clone(),
            validator,
            ai,
            config.upload.clone(),
        ));

        Self {
            config: Arc::new(config),
            storage,
            metadata,
            chunks,
            uploads,
            started_at: Instant::now(),
        }
    }

    /// Seconds since the server started.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
