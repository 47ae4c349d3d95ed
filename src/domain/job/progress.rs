//! Progress snapshots and stage weighting

use serde::Serialize;

use super::id::JobId;
use super::state::{JobState, Stage};
use crate::domain::error::ConfigError;

/// Point-in-time view of a job's progress
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub job_id: JobId,
    /// Strictly increasing per job
    pub sequence: u64,
    pub state: JobState,
    pub stage: Stage,
    /// 0-100, non-decreasing per job
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Percent bands of the pipeline stages.
/// Uploading covers `0..transcribing_start`, Transcribing covers
/// `transcribing_start..extracting_start`, Extracting covers `extracting_start..100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageWeights {
    transcribing_start: u8,
    extracting_start: u8,
}

impl StageWeights {
    pub fn new(transcribing_start: u8, extracting_start: u8) -> Result<Self, ConfigError> {
        if transcribing_start == 0 || transcribing_start >= extracting_start || extracting_start >= 100 {
            return Err(ConfigError::ValidationError {
                key: "weights".to_string(),
                message: format!(
                    "expected 0 < transcribing_start < extracting_start < 100, got {} and {}",
                    transcribing_start, extracting_start
                ),
            });
        }
        Ok(Self {
            transcribing_start,
            extracting_start,
        })
    }

    /// Percent range `(start, end)` of a stage
    pub const fn band(&self, stage: Stage) -> (u8, u8) {
        match stage {
            Stage::Uploading => (0, self.transcribing_start),
            Stage::Transcribing => (self.transcribing_start, self.extracting_start),
            Stage::Extracting => (self.extracting_start, 100),
        }
    }

    /// Map a fraction of a stage's work (clamped to 0.0..=1.0) onto the overall percent
    pub fn percent(&self, stage: Stage, fraction: f32) -> u8 {
        let (start, end) = self.band(stage);
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        start + (f32::from(end - start) * fraction).floor() as u8
    }
}

impl Default for StageWeights {
    fn default() -> Self {
        Self {
            transcribing_start: 10,
            extracting_start: 80,
        }
    }
}
