//! Application configuration value object

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::job::{Stage, StageWeights};
use crate::domain::units::{ByteSize, Duration};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_MAX_UPLOAD: ByteSize = ByteSize::from_mb(200);
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_mins(1);
pub const DEFAULT_TRANSCRIPTION_TIMEOUT: Duration = Duration::from_mins(10);
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_mins(2);
pub const DEFAULT_CANCEL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_mins(60);
pub const DEFAULT_COLLECTED_GRACE: Duration = Duration::from_mins(5);
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Stage weight boundaries, in percent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightsConfig {
    pub transcribing_start: Option<u8>,
    pub extracting_start: Option<u8>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub transcription_model: Option<String>,
    pub extraction_model: Option<String>,
    pub bind: Option<String>,
    pub max_upload: Option<String>,
    pub upload_timeout: Option<String>,
    pub transcription_timeout: Option<String>,
    pub extraction_timeout: Option<String>,
    pub cancel_timeout: Option<String>,
    pub result_ttl: Option<String>,
    pub collected_grace: Option<String>,
    pub max_concurrent_jobs: Option<usize>,
    pub blob_dir: Option<String>,
    pub journal_dir: Option<String>,
    pub weights: Option<WeightsConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        let defaults = StageWeights::default();
        Self {
            api_key: None,
            transcription_model: Some(DEFAULT_MODEL.to_string()),
            extraction_model: Some(DEFAULT_MODEL.to_string()),
            bind: Some(DEFAULT_BIND.to_string()),
            max_upload: Some(DEFAULT_MAX_UPLOAD.to_string()),
            upload_timeout: Some(DEFAULT_UPLOAD_TIMEOUT.to_string()),
            transcription_timeout: Some(DEFAULT_TRANSCRIPTION_TIMEOUT.to_string()),
            extraction_timeout: Some(DEFAULT_EXTRACTION_TIMEOUT.to_string()),
            cancel_timeout: Some(DEFAULT_CANCEL_TIMEOUT.to_string()),
            result_ttl: Some(DEFAULT_RESULT_TTL.to_string()),
            collected_grace: Some(DEFAULT_COLLECTED_GRACE.to_string()),
            max_concurrent_jobs: Some(DEFAULT_MAX_CONCURRENT_JOBS),
            blob_dir: None,
            journal_dir: None,
            weights: Some(WeightsConfig {
                transcribing_start: Some(defaults.band(Stage::Transcribing).0),
                extracting_start: Some(defaults.band(Stage::Extracting).0),
            }),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            api_key: other.api_key.or(self.api_key),
            transcription_model: other.transcription_model.or(self.transcription_model),
            extraction_model: other.extraction_model.or(self.extraction_model),
            bind: other.bind.or(self.bind),
            max_upload: other.max_upload.or(self.max_upload),
            upload_timeout: other.upload_timeout.or(self.upload_timeout),
            transcription_timeout: other.transcription_timeout.or(self.transcription_timeout),
            extraction_timeout: other.extraction_timeout.or(self.extraction_timeout),
            cancel_timeout: other.cancel_timeout.or(self.cancel_timeout),
            result_ttl: other.result_ttl.or(self.result_ttl),
            collected_grace: other.collected_grace.or(self.collected_grace),
            max_concurrent_jobs: other.max_concurrent_jobs.or(self.max_concurrent_jobs),
            blob_dir: other.blob_dir.or(self.blob_dir),
            journal_dir: other.journal_dir.or(self.journal_dir),
            weights: Self::merge_weights(self.weights, other.weights),
        }
    }

    /// Merge weight sections
    fn merge_weights(base: Option<WeightsConfig>, other: Option<WeightsConfig>) -> Option<WeightsConfig> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(WeightsConfig {
                transcribing_start: o.transcribing_start.or(b.transcribing_start),
                extracting_start: o.extracting_start.or(b.extracting_start),
            }),
        }
    }

    fn duration_or(value: &Option<String>, default: Duration) -> Duration {
        value
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    pub fn transcription_model_or_default(&self) -> &str {
        self.transcription_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn extraction_model_or_default(&self) -> &str {
        self.extraction_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn bind_or_default(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND)
    }

    /// Get max_upload as parsed ByteSize, or default if not set/invalid
    pub fn max_upload_or_default(&self) -> ByteSize {
        self.max_upload
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD)
    }

    pub fn upload_timeout_or_default(&self) -> Duration {
        Self::duration_or(&self.upload_timeout, DEFAULT_UPLOAD_TIMEOUT)
    }

    pub fn transcription_timeout_or_default(&self) -> Duration {
        Self::duration_or(&self.transcription_timeout, DEFAULT_TRANSCRIPTION_TIMEOUT)
    }

    pub fn extraction_timeout_or_default(&self) -> Duration {
        Self::duration_or(&self.extraction_timeout, DEFAULT_EXTRACTION_TIMEOUT)
    }

    pub fn cancel_timeout_or_default(&self) -> Duration {
        Self::duration_or(&self.cancel_timeout, DEFAULT_CANCEL_TIMEOUT)
    }

    pub fn result_ttl_or_default(&self) -> Duration {
        Self::duration_or(&self.result_ttl, DEFAULT_RESULT_TTL)
    }

    pub fn collected_grace_or_default(&self) -> Duration {
        Self::duration_or(&self.collected_grace, DEFAULT_COLLECTED_GRACE)
    }

    /// Get max_concurrent_jobs, never less than one
    pub fn max_concurrent_jobs_or_default(&self) -> usize {
        self.max_concurrent_jobs
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_JOBS)
    }

    /// Stage weights. Unlike the other getters, an invalid combination is an error.
    pub fn weights_or_default(&self) -> Result<StageWeights, ConfigError> {
        let defaults = StageWeights::default();
        let Some(weights) = &self.weights else {
            return Ok(defaults);
        };
        StageWeights::new(
            weights
                .transcribing_start
                .unwrap_or(defaults.band(Stage::Transcribing).0),
            weights
                .extracting_start
                .unwrap_or(defaults.band(Stage::Extracting).0),
        )
    }
}
