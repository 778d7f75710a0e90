use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::reviews::ingest::{IngestTimeouts, DEFAULT_ANALYSIS_TIMEOUT, DEFAULT_UPLOAD_TIMEOUT};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Where blobs and records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// S3-compatible blob store plus Redis.
    Remote,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

/// Connection settings for the remote backend.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    /// Present iff `storage` is `Remote`.
    pub remote: Option<RemoteConfig>,
    pub anthropic_api_key: String,
    pub anthropic_api_url: Option<String>,
    /// When set, `/api/v1` requests must carry `Authorization: Bearer <token>`.
    pub api_token: Option<String>,
    pub rasterizer_bin: String,
    pub upload_timeout: Duration,
    pub analysis_timeout: Duration,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage = match optional_env("STORAGE_BACKEND").as_deref() {
            None | Some("remote") => StorageBackend::Remote,
            Some("memory") => StorageBackend::Memory,
            Some(other) => bail!("STORAGE_BACKEND must be 'remote' or 'memory', got '{other}'"),
        };

        let remote = match storage {
            StorageBackend::Remote => Some(RemoteConfig {
                redis_url: require_env("REDIS_URL")?,
                s3_bucket: require_env("S3_BUCKET")?,
                s3_endpoint: require_env("S3_ENDPOINT")?,
                aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            StorageBackend::Memory => None,
        };

        Ok(Config {
            storage,
            remote,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            anthropic_api_url: optional_env("ANTHROPIC_API_URL"),
            api_token: optional_env("API_TOKEN"),
            rasterizer_bin: optional_env("RASTERIZER_BIN").unwrap_or_else(|| "pdftoppm".to_string()),
            upload_timeout: secs_env("UPLOAD_TIMEOUT_SECS", DEFAULT_UPLOAD_TIMEOUT)?,
            analysis_timeout: secs_env("ANALYSIS_TIMEOUT_SECS", DEFAULT_ANALYSIS_TIMEOUT)?,
            max_upload_bytes: match optional_env("MAX_UPLOAD_BYTES") {
                Some(raw) => raw
                    .parse::<usize>()
                    .context("MAX_UPLOAD_BYTES must be a byte count")?,
                None => DEFAULT_MAX_UPLOAD_BYTES,
            },
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn ingest_timeouts(&self) -> IngestTimeouts {
        IngestTimeouts {
            upload: self.upload_timeout,
            analysis: self.analysis_timeout,
        }
    }

    /// In-memory configuration for router tests.
    #[cfg(test)]
    pub fn for_tests(api_token: Option<&str>) -> Self {
        Config {
            storage: StorageBackend::Memory,
            remote: None,
            anthropic_api_key: "test-key".to_string(),
            anthropic_api_url: None,
            api_token: api_token.map(str::to_string),
            rasterizer_bin: "pdftoppm".to_string(),
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            port: 0,
            rust_log: "info".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and empty are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn secs_env(key: &str, default: Duration) -> Result<Duration> {
    match optional_env(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .with_context(|| format!("{key} must be a whole number of seconds")),
        None => Ok(default),
    }
}
