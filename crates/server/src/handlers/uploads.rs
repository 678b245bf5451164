//! Upload endpoint handlers.

use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    ASSEMBLE_DURATION, BYTES_UPLOADED, CHUNK_UPLOAD_DURATION, CHUNKS_DEDUPLICATED, CHUNKS_STORED,
    SESSIONS_COMPLETED, SESSIONS_CREATED,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use silo_core::api::{
    AiPipelineInfo, ChunkStatus, ChunkUploadRequest, ChunkUploadResponse, CompleteUploadRequest,
    CompleteUploadResponse, InitUploadRequest, InitUploadResponse, StatusResponse, UploadProgress,
};
use silo_core::{SessionId, SessionStatus};

/// Owner header recorded on session creation. Advisory; authentication is a
/// front-proxy concern.
const OWNER_HEADER: &str = "x-silo-owner";

/// POST /api/upload/init - create a new upload session.
#[tracing::instrument(skip(state, headers, body), fields(file_name = %body.file_name))]
pub async fn init_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<InitUploadRequest>,
) -> ApiResult<(StatusCode, Json<InitUploadResponse>)> {
    let owner_id = headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let session = state.uploads.initialize(&body, owner_id).await?;
    SESSIONS_CREATED.inc();

    Ok((
        StatusCode::CREATED,
        Json(InitUploadResponse {
            upload_id: session.session_id.to_string(),
            chunk_size: session.chunk_size as u64,
            total_chunks: session.total_chunks as u64,
            upload_url: "/api/upload/chunk".to_string(),
            expires_at: session.expires_at,
        }),
    ))
}

/// POST /api/upload/chunk - store one chunk, idempotently.
#[tracing::instrument(skip(state, body), fields(upload_id = %body.upload_id, chunk_index = body.chunk_index))]
pub async fn upload_chunk(
    State(state): State<AppState>,
    Json(body): Json<ChunkUploadRequest>,
) -> ApiResult<Json<ChunkUploadResponse>> {
    let session_id = SessionId::parse(&body.upload_id)
        .map_err(|e| ApiError::Validation(format!("invalid uploadId: {e}")))?;

    let payload = BASE64
        .decode(body.data.as_bytes())
        .map_err(|e| ApiError::Validation(format!("invalid base64 data: {e}")))?;

    let timer = CHUNK_UPLOAD_DURATION.start_timer();
    let outcome = state
        .chunks
        .store_chunk(session_id, body.chunk_index, Bytes::from(payload))
        .await?;
    timer.observe_duration();

    if outcome.is_stored() {
        CHUNKS_STORED.inc();
        BYTES_UPLOADED.inc_by(outcome.size());
    } else {
        CHUNKS_DEDUPLICATED.inc();
    }

    // The client's totalChunks is advisory; the session's own value decides.
    let (uploaded, total) = state.chunks.progress(session_id).await?;
    if let Some(client_total) = body.total_chunks
        && client_total != total
    {
        tracing::debug!(
            upload_id = %session_id,
            client_total,
            total,
            "client totalChunks disagrees with session"
        );
    }

    let status = if outcome.is_stored() {
        ChunkStatus::Uploaded
    } else {
        ChunkStatus::AlreadyUploaded
    };

    Ok(Json(ChunkUploadResponse {
        chunk_index: body.chunk_index,
        status,
        progress: UploadProgress::new(uploaded, total),
    }))
}

/// GET /api/upload/status/{upload_id} - report session state and gaps.
#[tracing::instrument(skip(state), fields(upload_id = %upload_id))]
pub async fn upload_status(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let session_id = SessionId::parse(&upload_id)
        .map_err(|_| ApiError::NotFound(format!("upload session not found: {upload_id}")))?;

    let report = state.uploads.status(session_id).await?;
    let status = report
        .session
        .session_status()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(StatusResponse {
        upload_id: report.session.session_id.to_string(),
        file_name: report.session.file_name.clone(),
        file_size: report.session.declared_size as u64,
        total_chunks: report.session.total_chunks as u64,
        uploaded_chunks: report.uploaded,
        missing_chunks: report.missing,
        status,
        created_at: report.session.created_at,
        expires_at: report.session.expires_at,
    }))
}

/// POST /api/upload/complete - assemble, verify, and finalize a session.
#[tracing::instrument(skip(state, body), fields(upload_id = %body.upload_id))]
pub async fn complete_upload(
    State(state): State<AppState>,
    Json(body): Json<CompleteUploadRequest>,
) -> ApiResult<Json<CompleteUploadResponse>> {
    let session_id = SessionId::parse(&body.upload_id)
        .map_err(|e| ApiError::Validation(format!("invalid uploadId: {e}")))?;

    let timer = ASSEMBLE_DURATION.start_timer();
    let outcome = state.uploads.complete(session_id).await?;
    timer.observe_duration();
    SESSIONS_COMPLETED.inc();

    Ok(Json(CompleteUploadResponse {
        upload_id: session_id.to_string(),
        status: SessionStatus::Completed,
        file_path: outcome.final_path,
        ai_pipeline: AiPipelineInfo {
            status: outcome.ai_job.status,
            estimated_time: outcome.ai_job.estimated_time,
            job_id: outcome.ai_job.job_id,
        },
    }))
}
