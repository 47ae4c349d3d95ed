//! Domain error types

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected <number><unit> with units h, m, s or ms (e.g., 30s, 5m, 2m30s, 1h)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when parsing a byte size string
#[derive(Debug, Clone, Error)]
#[error("Invalid size format: \"{input}\". Expected <number>[B|KB|MB|GB] (e.g., 512KB, 200MB)")]
pub struct ByteSizeParseError {
    pub input: String,
}

/// Error taxonomy surfaced by the job manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state transition: cannot {action} while in {current_state} state")]
    InvalidState {
        current_state: String,
        action: String,
    },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Result not ready: job is {state}")]
    NotReady { state: String },

    #[error("{stage} stage timed out after {after}")]
    Timeout { stage: String, after: String },

    #[error("Capability error: {0}")]
    CapabilityError(String),

    #[error("Internal failure: {0}")]
    InternalFailure(String),
}

impl JobError {
    pub fn invalid_state(current_state: impl ToString, action: impl Into<String>) -> Self {
        Self::InvalidState {
            current_state: current_state.to_string(),
            action: action.into(),
        }
    }
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
