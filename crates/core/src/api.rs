//! Wire types for the HTTP API.
//!
//! Field names follow the JSON contract (camelCase). Timestamps are
//! RFC 3339 strings.

use crate::session::SessionStatus;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Request body for `POST /api/upload/init`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    /// Optional expected digest in `<algo>:<hex>` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Opaque key/value bag forwarded to downstream consumers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Response body for `POST /api/upload/init`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    pub upload_id: String,
    pub chunk_size: u64,
    pub total_chunks: u64,
    pub upload_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Request body for `POST /api/upload/chunk`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadRequest {
    pub upload_id: String,
    pub chunk_index: u64,
    /// Advisory only; the session's own chunk count is authoritative.
    #[serde(default)]
    pub total_chunks: Option<u64>,
    /// Standard Base64 payload (no URL-safe alphabet, no line breaks).
    pub data: String,
}

/// Outcome of a single chunk upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Uploaded,
    AlreadyUploaded,
}

/// Upload progress summary.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct UploadProgress {
    pub uploaded: u64,
    pub total: u64,
    pub percentage: f64,
}

impl UploadProgress {
    /// Build a progress summary from counts.
    pub fn new(uploaded: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            (uploaded as f64 * 10_000.0 / total as f64).round() / 100.0
        };
        Self {
            uploaded,
            total,
            percentage,
        }
    }
}

/// Response body for `POST /api/upload/chunk`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadResponse {
    pub chunk_index: u64,
    pub status: ChunkStatus,
    pub progress: UploadProgress,
}

/// Response body for `GET /api/upload/status/{upload_id}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub upload_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub total_chunks: u64,
    pub uploaded_chunks: u64,
    pub missing_chunks: Vec<u64>,
    pub status: SessionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Request body for `POST /api/upload/complete`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub upload_id: String,
}

/// Downstream AI pipeline handoff summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiPipelineInfo {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// Response body for `POST /api/upload/complete`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    pub upload_id: String,
    pub status: SessionStatus,
    pub file_path: String,
    pub ai_pipeline: AiPipelineInfo,
}

/// Response body for `GET /health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Seconds since the server started.
    pub uptime: u64,
}
