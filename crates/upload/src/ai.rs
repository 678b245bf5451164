//! Fire-and-forget handoff of finalized objects to the AI pipeline.

use silo_core::config::AiConfig;
use silo_metadata::SessionRow;

/// Downstream pipeline selected from the session metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiPurpose {
    FineTuning,
    Embeddings,
    Training,
    Indexing,
    General,
}

impl AiPurpose {
    /// Parse from a metadata `purpose` value; unknown values fall back to
    /// the general pipeline.
    pub fn parse(s: &str) -> Self {
        match s {
            "fine-tuning" => Self::FineTuning,
            "embeddings" => Self::Embeddings,
            "training" => Self::Training,
            "indexing" => Self::Indexing,
            _ => Self::General,
        }
    }

    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FineTuning => "fine-tuning",
            Self::Embeddings => "embeddings",
            Self::Training => "training",
            Self::Indexing => "indexing",
            Self::General => "general",
        }
    }

    /// Rough completion estimate surfaced to the client.
    pub fn estimated_time(&self) -> &'static str {
        match self {
            Self::FineTuning => "2-4 hours",
            Self::Embeddings => "10-30 minutes",
            Self::Training => "4-8 hours",
            Self::Indexing => "5-15 minutes",
            Self::General => "30-60 minutes",
        }
    }
}

/// Reference to a dispatched (or skipped) downstream job.
#[derive(Debug, Clone)]
pub struct AiJobRef {
    pub job_id: Option<String>,
    pub pipeline: String,
    pub status: String,
    pub estimated_time: Option<String>,
}

/// The AI pipeline hook.
///
/// `submit` never blocks the completion response beyond constructing the job
/// reference; the actual handoff runs on a spawned task and its failures are
/// logged, never surfaced. Job IDs derive from the session ID so downstream
/// consumers can deduplicate at-least-once deliveries.
pub struct AiHook {
    config: AiConfig,
}

impl AiHook {
    /// Create the hook.
    pub fn new(config: AiConfig) -> Self {
        Self { config }
    }

    /// Dispatch the finalized object to the downstream pipeline.
    pub fn submit(&self, session: &SessionRow, final_path: &str) -> AiJobRef {
        let purpose = self.purpose_of(session);

        if !self.config.enabled {
            tracing::debug!(session_id = %session.session_id, "AI handoff disabled");
            return AiJobRef {
                job_id: None,
                pipeline: purpose.as_str().to_string(),
                status: "disabled".to_string(),
                estimated_time: None,
            };
        }

        let job_id = format!("aijob-{}", session.session_id);
        let merged_metadata = serde_json::json!({
            "jobId": job_id,
            "sessionId": session.session_id.to_string(),
            "fileName": session.file_name,
            "fileSize": session.declared_size,
            "fileType": session.declared_type,
            "purpose": purpose.as_str(),
            "metadata": session
                .metadata_json
                .as_deref()
                .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
                .unwrap_or(serde_json::Value::Null),
        });

        let spawned_job_id = job_id.clone();
        let spawned_path = final_path.to_string();
        tokio::spawn(async move {
            // The handoff is a queue publish in production; either way the
            // upload is already durable, so errors only get logged here.
            tracing::info!(
                job_id = %spawned_job_id,
                final_path = %spawned_path,
                payload = %merged_metadata,
                "dispatched finalized object to AI pipeline"
            );
        });

        AiJobRef {
            job_id: Some(job_id),
            pipeline: purpose.as_str().to_string(),
            status: "queued".to_string(),
            estimated_time: Some(purpose.estimated_time().to_string()),
        }
    }

    fn purpose_of(&self, session: &SessionRow) -> AiPurpose {
        let from_metadata = session
            .metadata_json
            .as_deref()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
            .and_then(|v| v.get("purpose").and_then(|p| p.as_str().map(String::from)));

        match from_metadata {
            Some(purpose) => AiPurpose::parse(&purpose),
            None => AiPurpose::parse(&self.config.default_purpose),
        }
    }
}
