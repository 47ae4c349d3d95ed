//! Scripted extractor

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{hang, pause};
use crate::application::ports::{CapabilityError, Extractor};
use crate::domain::job::{Extraction, ProcedureStep, Transcript};

/// What the extractor does once its delay has elapsed
#[derive(Debug, Clone)]
pub enum ExtractorScript {
    /// One step per transcript segment, keeping its timing
    FromTranscript,
    Return(Extraction),
    Fail(CapabilityError),
    /// Never answer; only cancellation ends the call
    Hang,
}

/// Extractor that follows a script
pub struct ScriptedExtractor {
    script: ExtractorScript,
    delay: Duration,
    ignore_cancel: bool,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new(script: ExtractorScript) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            ignore_cancel: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn returning(extraction: Extraction) -> Self {
        Self::new(ExtractorScript::Return(extraction))
    }

    pub fn failing(error: CapabilityError) -> Self {
        Self::new(ExtractorScript::Fail(error))
    }

    pub fn hanging() -> Self {
        Self::new(ExtractorScript::Hang)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn ignoring_cancel(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn from_transcript(transcript: &Transcript) -> Extraction {
        let steps: Vec<ProcedureStep> = transcript
            .segments()
            .iter()
            .map(|s| ProcedureStep::new(s.text.clone()).with_times(s.start, s.end))
            .collect();
        Extraction {
            summary: Some(format!("Procedure of {} steps", steps.len())),
            steps,
        }
    }
}

impl Default for ScriptedExtractor {
    fn default() -> Self {
        Self::new(ExtractorScript::FromTranscript)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(
        &self,
        transcript: &Transcript,
        cancel: CancellationToken,
    ) -> Result<Extraction, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pause(self.delay, &cancel, self.ignore_cancel).await?;

        match &self.script {
            ExtractorScript::FromTranscript => Ok(Self::from_transcript(transcript)),
            ExtractorScript::Return(extraction) => Ok(extraction.clone()),
            ExtractorScript::Fail(error) => Err(error.clone()),
            ExtractorScript::Hang => Err(hang(&cancel, self.ignore_cancel).await),
        }
    }
}
