//! Pre-ingest gating and post-assembly verification.

use crate::error::{UploadError, UploadResult};
use futures::StreamExt;
use silo_core::config::ValidationConfig;
use silo_core::{Digest, DigestHasher};
use silo_metadata::SessionRow;
use silo_storage::ObjectStore;
use std::sync::Arc;
use tracing::instrument;

/// Lowercase last `.`-segment of a file name, if any.
fn extension_of(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Request gating and assembled-object verification.
pub struct Validator {
    config: ValidationConfig,
    storage: Arc<dyn ObjectStore>,
}

impl Validator {
    /// Create a validator.
    pub fn new(config: ValidationConfig, storage: Arc<dyn ObjectStore>) -> Self {
        Self { config, storage }
    }

    /// Gate an init request on type, extension, and size.
    ///
    /// The type and extension allow-lists are checked independently and all
    /// failures are aggregated into one message. Returns the parsed expected
    /// digest when a checksum was supplied.
    pub fn validate_request(
        &self,
        file_name: &str,
        declared_type: &str,
        declared_size: u64,
        max_file_size: u64,
        checksum: Option<&str>,
    ) -> UploadResult<Option<Digest>> {
        let mut failures = Vec::new();

        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            failures.push(format!("invalid file name: {file_name:?}"));
        }

        match extension_of(file_name) {
            Some(ext) if self.config.allowed_extensions.iter().any(|a| *a == ext) => {}
            Some(ext) => failures.push(format!(
                "file extension '{ext}' not allowed (allowed: {})",
                self.config.allowed_extensions.join(", ")
            )),
            None => failures.push("file name has no extension".to_string()),
        }

        if !self
            .config
            .allowed_types
            .iter()
            .any(|a| a.eq_ignore_ascii_case(declared_type))
        {
            failures.push(format!(
                "file type '{declared_type}' not allowed (allowed: {})",
                self.config.allowed_types.join(", ")
            ));
        }

        if declared_size == 0 {
            failures.push("fileSize must be positive".to_string());
        } else if declared_size > max_file_size {
            failures.push(format!(
                "fileSize {declared_size} exceeds maximum {max_file_size}"
            ));
        }

        let digest = match checksum {
            Some(raw) => match Digest::parse(raw) {
                Ok(digest) if digest.algorithm().as_str() == self.config.digest_algorithm => {
                    Some(digest)
                }
                Ok(digest) => {
                    failures.push(format!(
                        "checksum algorithm '{}' not accepted",
                        digest.algorithm().as_str()
                    ));
                    None
                }
                Err(err) => {
                    failures.push(format!("invalid checksum: {err}"));
                    None
                }
            },
            None => None,
        };

        if !failures.is_empty() {
            return Err(UploadError::Validation(failures.join("; ")));
        }
        Ok(digest)
    }

    /// Verify the assembled object against the session's expected digest and
    /// structural rules.
    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub async fn verify(&self, session: &SessionRow, final_path: &str) -> UploadResult<()> {
        match &session.expected_digest {
            Some(raw) => {
                let expected = Digest::parse(raw)
                    .map_err(|e| UploadError::Internal(format!("stored digest unparsable: {e}")))?;
                let actual = self.digest_of(final_path, &expected).await?;
                if actual != expected {
                    return Err(UploadError::DigestMismatch {
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
                tracing::debug!(digest = %actual, "digest verified");
            }
            None => {
                tracing::warn!(
                    session_id = %session.session_id,
                    "no expected digest supplied, skipping integrity verification"
                );
            }
        }

        match extension_of(&session.file_name).as_deref() {
            Some("json") => self.verify_json(final_path).await?,
            Some("jsonl") => self.verify_jsonl(final_path).await?,
            _ => {}
        }

        Ok(())
    }

    /// Stream the final object through an incremental hasher.
    async fn digest_of(&self, final_path: &str, expected: &Digest) -> UploadResult<Digest> {
        let mut hasher = DigestHasher::new(expected.algorithm());
        let mut stream = self.storage.get_stream(final_path).await?;
        while let Some(chunk) = stream.next().await {
            hasher.update(&chunk?);
        }
        Ok(hasher.finalize())
    }

    /// The whole object must parse as a single JSON value.
    async fn verify_json(&self, final_path: &str) -> UploadResult<()> {
        let bytes = self.storage.get(final_path).await?;
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .map_err(|e| UploadError::Structural(format!("invalid JSON: {e}")))?;
        Ok(())
    }

    /// Every non-blank line must parse as a JSON value; the first failing
    /// line is reported.
    async fn verify_jsonl(&self, final_path: &str) -> UploadResult<()> {
        let mut stream = self.storage.get_stream(final_path).await?;
        let mut buf: Vec<u8> = Vec::new();
        let mut line_no: u64 = 0;

        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                line_no += 1;
                Self::check_jsonl_line(&line, line_no)?;
            }
        }
        if !buf.is_empty() {
            line_no += 1;
            Self::check_jsonl_line(&buf, line_no)?;
        }
        Ok(())
    }

    fn check_jsonl_line(line: &[u8], line_no: u64) -> UploadResult<()> {
        let trimmed: &[u8] = {
            let start = line
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .unwrap_or(line.len());
            let end = line
                .iter()
                .rposition(|b| !b.is_ascii_whitespace())
                .map_or(start, |e| e + 1);
            &line[start..end]
        };
        if trimmed.is_empty() {
            return Ok(());
        }
        serde_json::from_slice::<serde_json::Value>(trimmed)
            .map_err(|e| UploadError::Structural(format!("line {line_no}: {e}")))?;
        Ok(())
    }
}
