//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{ChunkRecordRow, SessionRow};
use crate::repos::{ChunkIndexRepo, RememberOutcome, SessionRepo};
use async_trait::async_trait;
use silo_core::SessionStatus;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: SessionRepo + ChunkIndexRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS upload_sessions (
    session_id      BLOB PRIMARY KEY NOT NULL,
    owner_id        TEXT,
    file_name       TEXT NOT NULL,
    declared_size   INTEGER NOT NULL,
    declared_type   TEXT NOT NULL,
    expected_digest TEXT,
    chunk_size      INTEGER NOT NULL,
    total_chunks    INTEGER NOT NULL,
    status          TEXT NOT NULL,
    final_path      TEXT,
    metadata_json   TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    expires_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_upload_sessions_status ON upload_sessions(status);
CREATE INDEX IF NOT EXISTS idx_upload_sessions_owner ON upload_sessions(owner_id);
CREATE INDEX IF NOT EXISTS idx_upload_sessions_expires ON upload_sessions(expires_at);

CREATE TABLE IF NOT EXISTS chunk_records (
    session_id  BLOB NOT NULL,
    idx         INTEGER NOT NULL,
    size_bytes  INTEGER NOT NULL,
    stored_at   TEXT NOT NULL,
    storage_key TEXT NOT NULL,
    PRIMARY KEY (session_id, idx)
);
CREATE INDEX IF NOT EXISTS idx_chunk_records_session ON chunk_records(session_id);
"#;

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store at `path`.
    ///
    /// `acquire_timeout` bounds how long a request waits for a pool
    /// connection; exhaustion surfaces as `Backpressure`.
    pub async fn new(
        path: impl AsRef<Path>,
        acquire_timeout: Option<Duration>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MetadataError::Config(format!("cannot create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
            .map_err(MetadataError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection avoids
            // persistent "database is locked" failures under axum concurrency.
            .max_connections(1)
            .acquire_timeout(acquire_timeout.unwrap_or(Duration::from_secs(5)))
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db_err)
            if db_err.message().contains("UNIQUE constraint"))
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepo for SqliteStore {
    async fn insert_session(&self, session: &SessionRow) -> MetadataResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO upload_sessions (
                session_id, owner_id, file_name, declared_size, declared_type,
                expected_digest, chunk_size, total_chunks, status, final_path,
                metadata_json, created_at, updated_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.session_id)
        .bind(&session.owner_id)
        .bind(&session.file_name)
        .bind(session.declared_size)
        .bind(&session.declared_type)
        .bind(&session.expected_digest)
        .bind(session.chunk_size)
        .bind(session.total_chunks)
        .bind(&session.status)
        .bind(&session.final_path)
        .bind(&session.metadata_json)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if Self::is_unique_violation(&e) => Err(MetadataError::Conflict(format!(
                "session {} already exists",
                session.session_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_session(&self, session_id: uuid::Uuid) -> MetadataResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM upload_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_status(
        &self,
        session_id: uuid::Uuid,
        new_status: SessionStatus,
        final_path: Option<&str>,
        updated_at: time::OffsetDateTime,
    ) -> MetadataResult<()> {
        if (new_status == SessionStatus::Completed) != final_path.is_some() {
            return Err(MetadataError::Internal(format!(
                "final_path must be set exactly when transitioning to completed (got {new_status})"
            )));
        }

        let sources = SessionStatus::sources_of(new_status);
        if sources.is_empty() {
            let current = self
                .get_session(session_id)
                .await?
                .ok_or_else(|| MetadataError::NotFound(format!("session {session_id}")))?;
            return Err(MetadataError::InvalidStateTransition {
                from: current.status,
                to: new_status.as_str().to_string(),
            });
        }

        // The conditional UPDATE is the state-machine gate: it applies only
        // when the current status is a legal source, atomically against
        // concurrent writers.
        let placeholders: Vec<&str> = sources.iter().map(|_| "?").collect();
        let sql = format!(
            "UPDATE upload_sessions
             SET status = ?, final_path = COALESCE(?, final_path), updated_at = ?
             WHERE session_id = ? AND status IN ({})",
            placeholders.join(", ")
        );

        let mut query = sqlx::query(&sql)
            .bind(new_status.as_str())
            .bind(final_path)
            .bind(updated_at)
            .bind(session_id);
        for source in &sources {
            query = query.bind(source.as_str());
        }

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current = self
            .get_session(session_id)
            .await?
            .ok_or_else(|| MetadataError::NotFound(format!("session {session_id}")))?;
        Err(MetadataError::InvalidStateTransition {
            from: current.status,
            to: new_status.as_str().to_string(),
        })
    }

    async fn begin_assembly(
        &self,
        session_id: uuid::Uuid,
        updated_at: time::OffsetDateTime,
    ) -> MetadataResult<bool> {
        let result = sqlx::query(
            "UPDATE upload_sessions SET status = 'assembling', updated_at = ?
             WHERE session_id = ? AND status = 'uploading'",
        )
        .bind(updated_at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revert_assembly(
        &self,
        session_id: uuid::Uuid,
        updated_at: time::OffsetDateTime,
    ) -> MetadataResult<bool> {
        let result = sqlx::query(
            "UPDATE upload_sessions SET status = 'uploading', updated_at = ?
             WHERE session_id = ? AND status = 'assembling'",
        )
        .bind(updated_at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_expired(
        &self,
        now: time::OffsetDateTime,
        limit: u32,
    ) -> MetadataResult<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM upload_sessions
             WHERE expires_at < ? AND status IN ('init', 'uploading', 'assembling')
             ORDER BY expires_at
             LIMIT ?",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ChunkIndexRepo for SqliteStore {
    async fn remember(&self, record: &ChunkRecordRow) -> MetadataResult<RememberOutcome> {
        // INSERT OR IGNORE is the atomic conditional write: exactly one of N
        // concurrent callers for the same key observes rows_affected = 1.
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO chunk_records (session_id, idx, size_bytes, stored_at, storage_key)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.session_id)
        .bind(record.idx)
        .bind(record.size_bytes)
        .bind(record.stored_at)
        .bind(&record.storage_key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(RememberOutcome::Inserted);
        }

        let existing = self
            .lookup(record.session_id, record.idx as u64)
            .await?
            .ok_or_else(|| {
                MetadataError::Internal(format!(
                    "chunk record ({}, {}) vanished between insert and lookup",
                    record.session_id, record.idx
                ))
            })?;
        Ok(RememberOutcome::AlreadyPresent(existing))
    }

    async fn lookup(
        &self,
        session_id: uuid::Uuid,
        idx: u64,
    ) -> MetadataResult<Option<ChunkRecordRow>> {
        let row = sqlx::query_as::<_, ChunkRecordRow>(
            "SELECT * FROM chunk_records WHERE session_id = ? AND idx = ?",
        )
        .bind(session_id)
        .bind(idx as i64)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn indices(&self, session_id: uuid::Uuid) -> MetadataResult<Vec<u64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT idx FROM chunk_records WHERE session_id = ? ORDER BY idx")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(idx,)| idx as u64).collect())
    }

    async fn count_chunks(&self, session_id: uuid::Uuid) -> MetadataResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_records WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn forget(&self, session_id: uuid::Uuid, idx: u64) -> MetadataResult<()> {
        sqlx::query("DELETE FROM chunk_records WHERE session_id = ? AND idx = ?")
            .bind(session_id)
            .bind(idx as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn forget_all(&self, session_id: uuid::Uuid) -> MetadataResult<()> {
        sqlx::query("DELETE FROM chunk_records WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
