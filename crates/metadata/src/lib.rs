//! Durable session store and chunk index for Silo.
//!
//! The session store is the source of truth for upload lifecycle state and
//! survives process restarts. The chunk index records which chunks have been
//! accepted; its conditional write is the service-wide idempotency
//! primitive. Both live in the same SQLite database so state transitions and
//! chunk reservations share one transactional backend.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{ChunkRecordRow, SessionRow};
pub use repos::{ChunkIndexRepo, RememberOutcome, SessionRepo};
pub use store::{MetadataStore, SqliteStore};

use silo_core::config::MetadataConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            acquire_timeout_secs,
        } => {
            let store =
                SqliteStore::new(path, Some(Duration::from_secs(*acquire_timeout_secs))).await?;
            Ok(Arc::new(store))
        }
    }
}
