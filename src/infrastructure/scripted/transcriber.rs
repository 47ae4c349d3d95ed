//! Scripted transcriber

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{hang, pause};
use crate::application::ports::{CapabilityError, ProgressCallback, Transcriber};
use crate::domain::job::{Transcript, TranscriptSegment};
use crate::domain::media::MediaPayload;

/// What the transcriber does once its delay has elapsed
#[derive(Debug, Clone)]
pub enum TranscriberScript {
    Return(Transcript),
    Fail(CapabilityError),
    /// Never answer; only cancellation ends the call
    Hang,
}

/// Transcriber that follows a script
pub struct ScriptedTranscriber {
    script: TranscriberScript,
    delay: Duration,
    progress_steps: u32,
    ignore_cancel: bool,
    calls: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new(script: TranscriberScript) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            progress_steps: 4,
            ignore_cancel: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn returning(transcript: Transcript) -> Self {
        Self::new(TranscriberScript::Return(transcript))
    }

    pub fn failing(error: CapabilityError) -> Self {
        Self::new(TranscriberScript::Fail(error))
    }

    pub fn hanging() -> Self {
        Self::new(TranscriberScript::Hang)
    }

    /// Spread `delay` over the call, reporting sub-progress along the way
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Keep running after cancellation, like a capability that never acknowledges
    pub fn ignoring_cancel(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }

    /// Number of transcribe calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// A short bench transcript
    pub fn sample_transcript() -> Transcript {
        Transcript::new(vec![
            TranscriptSegment::timed("Label three microcentrifuge tubes", 0.0, 4.0),
            TranscriptSegment::timed("Add 200 microlitres of lysis buffer to each tube", 4.0, 10.0),
            TranscriptSegment::timed("Vortex for ten seconds and spin down briefly", 10.0, 15.0),
        ])
    }
}

impl Default for ScriptedTranscriber {
    fn default() -> Self {
        Self::returning(Self::sample_transcript())
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        media: &MediaPayload,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<Transcript, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(size = %media.human_readable_size(), "Scripted transcription");

        let steps = self.progress_steps.max(1);
        for step in 1..=steps {
            pause(self.delay / steps, &cancel, self.ignore_cancel).await?;
            if let Some(on_progress) = &on_progress {
                on_progress(step as f32 / steps as f32);
            }
        }

        match &self.script {
            TranscriberScript::Return(transcript) => Ok(transcript.clone()),
            TranscriberScript::Fail(error) => Err(error.clone()),
            TranscriberScript::Hang => Err(hang(&cancel, self.ignore_cancel).await),
        }
    }
}
