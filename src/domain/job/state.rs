//! Job lifecycle states

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::error::JobError;

/// Job states.
///
/// State machine:
///   CREATED -> UPLOADING (start)
///   UPLOADING -> TRANSCRIBING (blob stored)
///   TRANSCRIBING -> EXTRACTING (transcript received, blob deleted)
///   EXTRACTING -> COMPLETED (procedure stored)
///   any non-terminal -> FAILED | CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Created,
    Uploading,
    Transcribing,
    Extracting,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Uploading => "uploading",
            Self::Transcribing => "transcribing",
            Self::Extracting => "extracting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a pipeline may be running in this state
    pub const fn is_processing(&self) -> bool {
        matches!(self, Self::Uploading | Self::Transcribing | Self::Extracting)
    }

    /// Pipeline stage a non-terminal state belongs to
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Created | Self::Uploading => Some(Stage::Uploading),
            Self::Transcribing => Some(Stage::Transcribing),
            Self::Extracting => Some(Stage::Extracting),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Uploading,
    Transcribing,
    Extracting,
}

impl Stage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Transcribing => "transcribing",
            Self::Extracting => "extracting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: JobState,
    pub action: String,
}

impl InvalidStateTransition {
    pub fn new(current_state: JobState, action: impl Into<String>) -> Self {
        Self {
            current_state,
            action: action.into(),
        }
    }
}

impl From<InvalidStateTransition> for JobError {
    fn from(err: InvalidStateTransition) -> Self {
        JobError::InvalidState {
            current_state: err.current_state.to_string(),
            action: err.action,
        }
    }
}
