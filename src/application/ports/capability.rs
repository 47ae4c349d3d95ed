//! External capability ports: transcription and procedure extraction

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::job::{Extraction, Transcript};
use crate::domain::media::MediaPayload;

/// Errors reported by an external capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("Capability timed out")]
    Timeout,

    #[error("Capability unavailable: {0}")]
    Unavailable(String),

    #[error("Capability returned unusable output: {0}")]
    BadOutput(String),

    #[error("Capability call was cancelled")]
    Cancelled,
}

/// Sub-progress callback. The argument is the completed fraction of the call, 0.0 to 1.0.
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Port for speech-to-text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe media to an ordered transcript.
    ///
    /// # Arguments
    /// * `media` - The uploaded recording
    /// * `on_progress` - Optional callback for sub-progress updates
    /// * `cancel` - Triggered when the job is cancelled; implementations
    ///   should stop and return `CapabilityError::Cancelled`
    async fn transcribe(
        &self,
        media: &MediaPayload,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<Transcript, CapabilityError>;
}

/// Port for turning a transcript into procedure steps
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract a summary and ordered steps. The output is validated by the caller.
    async fn extract(
        &self,
        transcript: &Transcript,
        cancel: CancellationToken,
    ) -> Result<Extraction, CapabilityError>;
}
