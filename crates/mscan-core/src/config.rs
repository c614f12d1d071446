//! Application configuration model.
//!
//! Every field has a default so a partial (or absent) `config.toml` is valid.
//! Loading and environment overrides live in `mscan-infrastructure`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Hard ceiling for multipart uploads.
pub const MAX_UPLOAD_CEILING: u64 = 64 * 1024 * 1024;
/// Smallest upload limit worth running with.
pub const MIN_UPLOAD_BYTES: u64 = 1024 * 1024;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub workflow: WorkflowConfig,
    pub storage: StorageConfig,
    pub poller: PollerConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            gemini: GeminiConfig::default(),
            workflow: WorkflowConfig::default(),
            storage: StorageConfig::default(),
            poller: PollerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Checks settings every binary depends on.
    ///
    /// Out-of-range upload limits are clamped rather than rejected; the
    /// returned list describes each adjustment so callers can log it.
    pub fn validate(&mut self) -> Result<Vec<String>> {
        let mut adjustments = Vec::new();

        if self.server.port == 0 {
            return Err(ScanError::config("server.port must be non-zero"));
        }
        if self.poller.interval_secs == 0 {
            return Err(ScanError::config("poller.interval_secs must be non-zero"));
        }
        if self.workflow.max_duration_secs == 0 {
            return Err(ScanError::config(
                "workflow.max_duration_secs must be non-zero",
            ));
        }

        if self.server.max_upload_bytes > MAX_UPLOAD_CEILING {
            adjustments.push(format!(
                "server.max_upload_bytes ({}) exceeds the ceiling, using {}",
                self.server.max_upload_bytes, MAX_UPLOAD_CEILING
            ));
            self.server.max_upload_bytes = MAX_UPLOAD_CEILING;
        }
        if self.server.max_upload_bytes < MIN_UPLOAD_BYTES {
            adjustments.push(format!(
                "server.max_upload_bytes ({}) is too small, using {}",
                self.server.max_upload_bytes, MIN_UPLOAD_BYTES
            ));
            self.server.max_upload_bytes = MIN_UPLOAD_BYTES;
        }

        Ok(adjustments)
    }

    /// Additional checks for processes that call the LLM provider.
    pub fn require_api_key(&self) -> Result<()> {
        if self.gemini.api_key.trim().is_empty() {
            return Err(ScanError::config(
                "GOOGLE_API_KEY environment variable (or gemini.api_key) is required",
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model for document analysis and report consolidation.
    pub model: String,
    /// Model for search-grounded questions.
    pub search_model: String,
    pub temperature: f32,
    pub search_temperature: f32,
    pub max_output_tokens: u32,
    pub report_max_output_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-pro".to_string(),
            search_model: "gemini-2.5-flash".to_string(),
            temperature: 0.1,
            search_temperature: 0.2,
            max_output_tokens: 8192,
            report_max_output_tokens: 16384,
            request_timeout_secs: 300,
        }
    }
}

// API keys never show up in logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("model", &self.model)
            .field("search_model", &self.search_model)
            .field("temperature", &self.temperature)
            .field("search_temperature", &self.search_temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("report_max_output_tokens", &self.report_max_output_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Upper bound for one analysis run before the session is failed.
    pub max_duration_secs: u64,
    /// Extra attempts for retryable LLM errors, per node.
    pub node_retries: u32,
    pub retry_backoff_ms: u64,
    /// Write each final report under the reports directory.
    pub archive_reports: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 900,
            node_retries: 2,
            retry_backoff_ms: 1000,
            archive_reports: true,
        }
    }
}

impl WorkflowConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for prompts, versions, uploads, reports and logs.
    /// `None` means the platform data directory.
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_secs: u64,
    pub max_wait_secs: u64,
    /// Consecutive transport failures tolerated before giving up.
    pub max_transient_failures: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_wait_secs: 1800,
            max_transient_failures: 5,
        }
    }
}
