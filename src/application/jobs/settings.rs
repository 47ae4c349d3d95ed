//! Resolved engine settings

use crate::domain::config::{self, AppConfig};
use crate::domain::error::ConfigError;
use crate::domain::job::StageWeights;
use crate::domain::units::{ByteSize, Duration};

/// Concrete values the job manager runs with
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub max_upload: ByteSize,
    pub upload_timeout: Duration,
    pub transcription_timeout: Duration,
    pub extraction_timeout: Duration,
    pub cancel_timeout: Duration,
    pub result_ttl: Duration,
    pub collected_grace: Duration,
    pub max_concurrent_jobs: usize,
    pub weights: StageWeights,
}

impl EngineSettings {
    /// Resolve from a merged configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            max_upload: config.max_upload_or_default(),
            upload_timeout: config.upload_timeout_or_default(),
            transcription_timeout: config.transcription_timeout_or_default(),
            extraction_timeout: config.extraction_timeout_or_default(),
            cancel_timeout: config.cancel_timeout_or_default(),
            result_ttl: config.result_ttl_or_default(),
            collected_grace: config.collected_grace_or_default(),
            max_concurrent_jobs: config.max_concurrent_jobs_or_default(),
            weights: config.weights_or_default()?,
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_upload: config::DEFAULT_MAX_UPLOAD,
            upload_timeout: config::DEFAULT_UPLOAD_TIMEOUT,
            transcription_timeout: config::DEFAULT_TRANSCRIPTION_TIMEOUT,
            extraction_timeout: config::DEFAULT_EXTRACTION_TIMEOUT,
            cancel_timeout: config::DEFAULT_CANCEL_TIMEOUT,
            result_ttl: config::DEFAULT_RESULT_TTL,
            collected_grace: config::DEFAULT_COLLECTED_GRACE,
            max_concurrent_jobs: config::DEFAULT_MAX_CONCURRENT_JOBS,
            weights: StageWeights::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_empty_config_matches_default() {
        let settings = EngineSettings::from_config(&AppConfig::empty()).unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn from_config_reads_overrides() {
        let config = AppConfig {
            cancel_timeout: Some("2s".to_string()),
            max_concurrent_jobs: Some(1),
            ..Default::default()
        };
        let settings = EngineSettings::from_config(&config).unwrap();
        assert_eq!(settings.cancel_timeout, Duration::from_secs(2));
        assert_eq!(settings.max_concurrent_jobs, 1);
    }
}
