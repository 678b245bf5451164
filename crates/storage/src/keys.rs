//! Object-store key layout for upload sessions.
//!
//! The key namespace is partitioned into two prefixes:
//! - `{temp_prefix}/{session_id}/chunk_{index}` for in-flight chunks
//! - `{final_prefix}/{session_id}/{session_id}_{file_name}` for assembled objects

use silo_core::SessionId;

/// Key for a temporary chunk.
pub fn temp_chunk_key(temp_prefix: &str, session_id: SessionId, index: u64) -> String {
    format!("{temp_prefix}/{session_id}/chunk_{index}")
}

/// Prefix holding every temporary chunk of a session, for listing and cleanup.
pub fn session_temp_prefix(temp_prefix: &str, session_id: SessionId) -> String {
    format!("{temp_prefix}/{session_id}")
}

/// Key for the assembled final object.
pub fn final_object_key(final_prefix: &str, session_id: SessionId, file_name: &str) -> String {
    format!("{final_prefix}/{session_id}/{session_id}_{file_name}")
}

/// Parse the chunk index back out of a temp chunk key.
///
/// Accepts either a full key or a bare `chunk_{index}` file name. Returns
/// `None` for keys that do not follow the layout; callers treat such
/// objects as foreign and leave them alone.
pub fn parse_chunk_index(key: &str) -> Option<u64> {
    let name = key.rsplit('/').next()?;
    name.strip_prefix("chunk_")?.parse().ok()
}
