//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Per-request deadline in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Grace period for in-flight requests on shutdown before the process exits.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
            request_timeout_secs: default_request_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// Object storage backend configuration.
///
/// The backend is a startup-time toggle. Falling back between backends at
/// runtime would mask real outages, so no automatic switching happens here.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage (development default).
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if unset.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the ambient credential chain if unset.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Seconds to wait for a pool connection before failing with backpressure.
        #[serde(default = "default_acquire_timeout_secs")]
        acquire_timeout_secs: u64,
    },
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

/// Upload session configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Bytes per chunk, assigned to every new session.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Upper bound on declared file size.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Session lifetime in seconds from creation.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Interval between expiry sweep runs.
    #[serde(default = "default_expiry_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,
    /// Object-store prefix for temporary chunks.
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,
    /// Object-store prefix for assembled objects.
    #[serde(default = "default_final_prefix")]
    pub final_prefix: String,
}

fn default_chunk_size() -> u64 {
    crate::DEFAULT_CHUNK_SIZE
}

fn default_max_file_size() -> u64 {
    crate::DEFAULT_MAX_FILE_SIZE
}

fn default_session_ttl_secs() -> u64 {
    86_400 // 24 hours
}

fn default_expiry_sweep_interval_secs() -> u64 {
    300
}

fn default_temp_prefix() -> String {
    "temp-chunks".to_string()
}

fn default_final_prefix() -> String {
    "final".to_string()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_file_size: default_max_file_size(),
            session_ttl_secs: default_session_ttl_secs(),
            expiry_sweep_interval_secs: default_expiry_sweep_interval_secs(),
            temp_prefix: default_temp_prefix(),
            final_prefix: default_final_prefix(),
        }
    }
}

impl UploadConfig {
    /// Session lifetime as a Duration.
    pub fn session_ttl(&self) -> Duration {
        let secs = i64::try_from(self.session_ttl_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Sweep interval as a std Duration.
    pub fn expiry_sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.expiry_sweep_interval_secs)
    }

    /// Validate upload configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("upload.chunk_size must be positive".to_string());
        }
        if self.max_file_size == 0 {
            return Err("upload.max_file_size must be positive".to_string());
        }
        if self.session_ttl_secs == 0 {
            return Err("upload.session_ttl_secs must be positive".to_string());
        }
        if self.expiry_sweep_interval_secs == 0 {
            return Err(
                "upload.expiry_sweep_interval_secs cannot be 0 (the sweep timer would panic)"
                    .to_string(),
            );
        }
        if self.temp_prefix.is_empty() || self.final_prefix.is_empty() {
            return Err("upload prefixes must be non-empty".to_string());
        }
        if self.temp_prefix == self.final_prefix {
            return Err("upload.temp_prefix and upload.final_prefix must differ".to_string());
        }
        Ok(())
    }
}

/// Validator gating configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Allowed declared MIME types.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    /// Allowed file name extensions (without the dot, lowercase).
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Digest algorithm accepted in the `checksum` field.
    #[serde(default = "default_digest_algorithm")]
    pub digest_algorithm: String,
}

fn default_allowed_types() -> Vec<String> {
    [
        "application/json",
        "application/jsonl",
        "application/x-ndjson",
        "text/csv",
        "text/plain",
        "application/octet-stream",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_allowed_extensions() -> Vec<String> {
    ["json", "jsonl", "csv", "txt", "parquet", "bin"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_digest_algorithm() -> String {
    "sha256".to_string()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allowed_types: default_allowed_types(),
            allowed_extensions: default_allowed_extensions(),
            digest_algorithm: default_digest_algorithm(),
        }
    }
}

impl ValidationConfig {
    /// Validate validator configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.digest_algorithm != "sha256" {
            return Err(format!(
                "validation.digest_algorithm '{}' is not supported (only sha256)",
                self.digest_algorithm
            ));
        }
        if self.allowed_types.is_empty() {
            return Err("validation.allowed_types must not be empty".to_string());
        }
        if self.allowed_extensions.is_empty() {
            return Err("validation.allowed_extensions must not be empty".to_string());
        }
        Ok(())
    }
}

/// AI pipeline handoff configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AiConfig {
    /// Enable the downstream handoff (default: true).
    #[serde(default = "default_ai_enabled")]
    pub enabled: bool,
    /// Purpose used when the session metadata carries none.
    #[serde(default = "default_ai_purpose")]
    pub default_purpose: String,
}

fn default_ai_enabled() -> bool {
    true
}

fn default_ai_purpose() -> String {
    "general".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: default_ai_enabled(),
            default_purpose: default_ai_purpose(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Upload session configuration.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Validator gating configuration.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// AI pipeline handoff configuration.
    #[serde(default)]
    pub ai: AiConfig,
}

impl AppConfig {
    /// Validate the whole configuration, failing on the first error.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.upload.validate()?;
        self.validation.validate()?;
        Ok(())
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage and SQLite metadata.
    pub fn for_testing() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn upload_config_rejects_zero_chunk_size() {
        let config = UploadConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn upload_config_rejects_colliding_prefixes() {
        let config = UploadConfig {
            temp_prefix: "objects".to_string(),
            final_prefix: "objects".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_config_rejects_unknown_algorithm() {
        let config = ValidationConfig {
            digest_algorithm: "md5".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn storage_config_rejects_partial_credentials() {
        let config = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access".to_string()),
            secret_access_key: None,
            force_path_style: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn metadata_config_deserializes_tagged_form() {
        let toml = r#"
            type = "sqlite"
            path = "/tmp/silo.db"
        "#;
        let config: MetadataConfig = toml_like(toml);
        let MetadataConfig::Sqlite {
            path,
            acquire_timeout_secs,
        } = config;
        assert_eq!(path, PathBuf::from("/tmp/silo.db"));
        assert_eq!(acquire_timeout_secs, 5);
    }

    // Round-trip through JSON to avoid a toml dev-dependency here.
    fn toml_like(s: &str) -> MetadataConfig {
        let mut map = serde_json::Map::new();
        for line in s.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (key, value) = line.split_once('=').unwrap();
            let value = value.trim().trim_matches('"');
            map.insert(key.trim().to_string(), serde_json::json!(value));
        }
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }
}
