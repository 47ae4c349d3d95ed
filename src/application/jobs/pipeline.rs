//! Stage execution for a single job

use std::future::Future;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use super::slot::{ActiveGuard, JobSlot};
use super::JobManager;
use crate::application::ports::{CapabilityError, JournalEntry, ProgressCallback};
use crate::domain::error::JobError;
use crate::domain::job::{
    BlobHandle, InvalidStateTransition, Job, JobFailure, JobState, Procedure, Stage, Transcript,
};
use crate::domain::media::MediaPayload;
use crate::domain::units::Duration;

/// Why a pipeline stopped before completing
#[derive(Debug)]
pub(super) enum Interrupt {
    Cancelled,
    Failed(JobError),
}

impl From<JobError> for Interrupt {
    fn from(err: JobError) -> Self {
        Self::Failed(err)
    }
}

impl From<InvalidStateTransition> for Interrupt {
    fn from(err: InvalidStateTransition) -> Self {
        Self::Failed(err.into())
    }
}

fn capability_interrupt(err: CapabilityError, stage: Stage, limit: Duration) -> Interrupt {
    match err {
        CapabilityError::Cancelled => Interrupt::Cancelled,
        CapabilityError::Timeout => Interrupt::Failed(JobError::Timeout {
            stage: stage.to_string(),
            after: limit.to_string(),
        }),
        other => Interrupt::Failed(JobError::CapabilityError(other.to_string())),
    }
}

/// Bound a stage step by its timeout
async fn within<T, F>(stage: Stage, limit: Duration, step: F) -> Result<T, Interrupt>
where
    F: Future<Output = Result<T, Interrupt>>,
{
    match tokio::time::timeout(limit.as_std(), step).await {
        Ok(result) => result,
        Err(_) => Err(Interrupt::Failed(JobError::Timeout {
            stage: stage.to_string(),
            after: limit.to_string(),
        })),
    }
}

impl JobManager {
    /// Run the job to a terminal state. Holds the active guard throughout.
    pub(super) async fn drive(&self, slot: Arc<JobSlot>, _active: ActiveGuard) {
        let job_id = slot.job().id();
        let outcome = self.run_stages(&slot).await;

        match outcome {
            Ok(procedure) => self.finish_completed(&slot, procedure).await,
            Err(interrupt) => self.finish_interrupted(&slot, interrupt).await,
        }
        tracing::debug!(job_id = %job_id, "Pipeline finished");
    }

    async fn run_stages(&self, slot: &Arc<JobSlot>) -> Result<Procedure, Interrupt> {
        let state = slot.job().state();
        if state != JobState::Uploading {
            return Err(Interrupt::Failed(JobError::InternalFailure(format!(
                "cannot resume a job in {} state",
                state
            ))));
        }

        let _permit = self.acquire_permit(slot).await?;
        let format = slot.job().format();
        let handle = self.upload(slot).await?;
        let media = self.consume(slot, handle).await?;
        let transcript = self
            .transcribe(slot, MediaPayload::new(media, format))
            .await?;
        self.extract(slot, &transcript).await
    }

    async fn acquire_permit(&self, slot: &JobSlot) -> Result<OwnedSemaphorePermit, Interrupt> {
        let token = slot.cancel_token().clone();
        let permits = Arc::clone(&self.inner.permits);

        if permits.available_permits() == 0 {
            let job_id = slot.job().id();
            tracing::debug!(job_id = %job_id, "Job queued");
            self.inner.progress.publish(
                job_id,
                JobState::Uploading,
                Stage::Uploading,
                0,
                Some("queued".to_string()),
            );
        }

        tokio::select! {
            permit = permits.acquire_owned() => permit
                .map_err(|e| Interrupt::Failed(JobError::InternalFailure(e.to_string()))),
            _ = token.cancelled() => Err(Interrupt::Cancelled),
        }
    }

    /// Uploading: persist the bytes through the blob store
    async fn upload(&self, slot: &Arc<JobSlot>) -> Result<BlobHandle, Interrupt> {
        let payload = slot.take_payload().ok_or_else(|| {
            JobError::InternalFailure("uploaded media is no longer available".to_string())
        })?;
        let handle = BlobHandle::new();
        let job = {
            let mut job = slot.job();
            job.attach_blob(handle.clone())?;
            job.clone()
        };
        let job_id = job.id();
        self.inner.progress.publish(
            job_id,
            JobState::Uploading,
            Stage::Uploading,
            0,
            Some("uploading".to_string()),
        );

        self.inner
            .journal
            .record(&JournalEntry::for_job(&job, Some(handle.clone()), false))
            .await
            .map_err(|e| JobError::InternalFailure(format!("journal write failed: {}", e)))?;

        let token = slot.cancel_token().clone();
        let blobs = Arc::clone(&self.inner.blobs);
        let data = payload.into_data();
        let put_handle = handle.clone();
        within(Stage::Uploading, self.inner.settings.upload_timeout, async move {
            tokio::select! {
                stored = blobs.put(&put_handle, data) => stored
                    .map_err(|e| Interrupt::Failed(JobError::InternalFailure(e.to_string()))),
                _ = token.cancelled() => Err(Interrupt::Cancelled),
            }
        })
        .await?;

        let (_, end) = self.inner.settings.weights.band(Stage::Uploading);
        self.inner
            .progress
            .publish(job_id, JobState::Uploading, Stage::Uploading, end, None);
        tracing::debug!(job_id = %job_id, blob = %handle, "Media stored");
        Ok(handle)
    }

    /// Uploading -> Transcribing: read the blob back, deleting it in the same step
    async fn consume(&self, slot: &Arc<JobSlot>, handle: BlobHandle) -> Result<bytes::Bytes, Interrupt> {
        // A forced cancel may have released the slot while the write was still
        // in flight, so the handle is deleted again on these exits.
        if slot.cancel_token().is_cancelled() {
            slot.push_undeleted(handle);
            return Err(Interrupt::Cancelled);
        }
        let began = {
            let mut job = slot.job();
            job.begin_transcription().map(|()| {
                job.take_blob();
                job.clone()
            })
        };
        let job = match began {
            Ok(job) => job,
            Err(e) => {
                slot.push_undeleted(handle);
                return Err(e.into());
            }
        };
        let job_id = job.id();
        let (start, _) = self.inner.settings.weights.band(Stage::Transcribing);
        self.inner
            .progress
            .publish(job_id, JobState::Transcribing, Stage::Transcribing, start, None);

        let blobs = Arc::clone(&self.inner.blobs);
        let consume_handle = handle.clone();
        let consumed = within(Stage::Transcribing, self.inner.settings.transcription_timeout, async move {
            blobs
                .consume_and_delete(&consume_handle)
                .await
                .map_err(|e| Interrupt::Failed(JobError::InternalFailure(e.to_string())))
        })
        .await;

        match consumed {
            Ok(media) => {
                tracing::info!(job_id = %job_id, blob = %handle, "Uploaded media consumed and deleted");
                self.journal_best_effort(JournalEntry::for_job(&job, Some(handle), true))
                    .await;
                Ok(media)
            }
            Err(interrupt) => {
                slot.push_undeleted(handle);
                Err(interrupt)
            }
        }
    }

    /// Transcribing: hand the media to the transcriber
    async fn transcribe(&self, slot: &Arc<JobSlot>, media: MediaPayload) -> Result<Transcript, Interrupt> {
        let job_id = slot.job().id();
        let limit = self.inner.settings.transcription_timeout;
        let on_progress = self.transcription_progress(slot);
        let transcriber = Arc::clone(&self.inner.transcriber);
        let token = slot.cancel_token().clone();

        let transcript = within(Stage::Transcribing, limit, async move {
            let result = transcriber.transcribe(&media, Some(on_progress), token).await;
            drop(media);
            result.map_err(|e| capability_interrupt(e, Stage::Transcribing, limit))
        })
        .await?;

        if transcript.is_blank() {
            return Err(capability_interrupt(
                CapabilityError::BadOutput("transcript is empty".to_string()),
                Stage::Transcribing,
                limit,
            ));
        }
        tracing::debug!(job_id = %job_id, segments = transcript.segments().len(), "Transcript received");
        Ok(transcript)
    }

    /// Maps transcriber sub-progress into the Transcribing band while the job is still transcribing
    fn transcription_progress(&self, slot: &Arc<JobSlot>) -> ProgressCallback {
        let slot = Arc::clone(slot);
        let progress = Arc::clone(&self.inner.progress);
        let weights = self.inner.settings.weights;
        Arc::new(move |fraction: f32| {
            let job_id = {
                let job = slot.job();
                if job.state() != JobState::Transcribing {
                    return;
                }
                job.id()
            };
            progress.publish(
                job_id,
                JobState::Transcribing,
                Stage::Transcribing,
                weights.percent(Stage::Transcribing, fraction),
                None,
            );
        })
    }

    /// Transcribing -> Extracting: turn the transcript into a validated procedure
    async fn extract(&self, slot: &Arc<JobSlot>, transcript: &Transcript) -> Result<Procedure, Interrupt> {
        if slot.cancel_token().is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        let job_id = {
            let mut job = slot.job();
            job.begin_extraction()?;
            job.id()
        };
        let (start, _) = self.inner.settings.weights.band(Stage::Extracting);
        self.inner
            .progress
            .publish(job_id, JobState::Extracting, Stage::Extracting, start, None);

        let limit = self.inner.settings.extraction_timeout;
        let extractor = Arc::clone(&self.inner.extractor);
        let token = slot.cancel_token().clone();
        let extraction = within(Stage::Extracting, limit, async move {
            extractor
                .extract(transcript, token)
                .await
                .map_err(|e| capability_interrupt(e, Stage::Extracting, limit))
        })
        .await?;

        Procedure::from_extraction(extraction).ok_or_else(|| {
            capability_interrupt(
                CapabilityError::BadOutput("no procedure steps extracted".to_string()),
                Stage::Extracting,
                limit,
            )
        })
    }

    async fn finish_completed(&self, slot: &Arc<JobSlot>, procedure: Procedure) {
        let committed = {
            let mut job = slot.job();
            if job.cancel_requested() || slot.cancel_token().is_cancelled() {
                None
            } else {
                let steps = procedure.steps.len();
                match job.complete(procedure) {
                    Ok(()) => Some((job.clone(), steps)),
                    Err(e) => {
                        tracing::debug!(job_id = %job.id(), "Discarding result: {e}");
                        return;
                    }
                }
            }
        };

        match committed {
            Some((job, steps)) => {
                self.inner.progress.publish(
                    job.id(),
                    JobState::Completed,
                    Stage::Extracting,
                    100,
                    None,
                );
                tracing::info!(job_id = %job.id(), steps, "Job completed");
                self.journal_best_effort(JournalEntry::for_job(&job, None, true))
                    .await;
            }
            None => self.finish_interrupted(slot, Interrupt::Cancelled).await,
        }
    }

    /// Move the job to Failed or Cancelled and delete whatever media it still holds.
    /// Safe to call on a job that was already forced terminal.
    pub(super) async fn finish_interrupted(&self, slot: &Arc<JobSlot>, interrupt: Interrupt) {
        let (job, transitioned, mut handles) = {
            let mut job = slot.job();
            let transitioned = if job.is_terminal() {
                false
            } else if matches!(interrupt, Interrupt::Cancelled) || job.cancel_requested() {
                job.cancel().is_ok()
            } else if let Interrupt::Failed(err) = &interrupt {
                let failure = JobFailure::from_error(job.stage(), err);
                job.fail(failure).is_ok()
            } else {
                false
            };
            let handles: Vec<BlobHandle> = job.take_blob().into_iter().collect();
            (job.clone(), transitioned, handles)
        };
        handles.extend(slot.take_undeleted());
        // A job stopped before its upload step still holds the submitted bytes
        if let Some(payload) = slot.take_payload() {
            tracing::debug!(job_id = %job.id(), size = %payload.human_readable_size(), "Pending upload dropped");
        }

        let deleted_all = self.release_blobs(&job, &handles).await;

        if transitioned {
            self.publish_terminal(&job);
            match (job.state(), job.failure()) {
                (JobState::Failed, Some(failure)) => tracing::warn!(
                    job_id = %job.id(),
                    stage = %failure.stage,
                    kind = %failure.kind,
                    error = %failure.message,
                    "Job failed"
                ),
                _ => tracing::info!(job_id = %job.id(), stage = %job.stage(), "Job cancelled"),
            }
        }

        let pending = if deleted_all { None } else { handles.first().cloned() };
        let entry = JournalEntry::for_job(&job, pending.clone(), pending.is_none());
        self.journal_best_effort(entry).await;
    }

    /// Transition a job to Cancelled without waiting for its pipeline
    pub(super) async fn force_cancel(&self, slot: &Arc<JobSlot>) {
        self.finish_interrupted(slot, Interrupt::Cancelled).await;
    }

    fn publish_terminal(&self, job: &Job) {
        let message = match job.state() {
            JobState::Failed => job.failure().map(|f| f.message.clone()),
            JobState::Cancelled => Some("cancelled".to_string()),
            _ => None,
        };
        // Percent 0 keeps the last published percent
        self.inner
            .progress
            .publish(job.id(), job.state(), job.stage(), 0, message);
    }

    /// Delete handles still owned by a job. Failures are reported on the
    /// privacy target and never block the caller.
    ///
    /// # Returns
    /// Whether every deletion succeeded
    pub(super) async fn release_blobs(&self, job: &Job, handles: &[BlobHandle]) -> bool {
        let mut all_deleted = true;
        for handle in handles {
            match self.inner.blobs.force_delete(handle).await {
                Ok(removed) => {
                    tracing::debug!(job_id = %job.id(), blob = %handle, removed, "Uploaded media released")
                }
                Err(e) => {
                    all_deleted = false;
                    tracing::error!(
                        target: "labscribe::privacy",
                        job_id = %job.id(),
                        blob = %handle,
                        error = %e,
                        "Failed to delete uploaded media"
                    );
                }
            }
        }
        all_deleted
    }

    /// Record or drop a journal entry; failures are logged only
    pub(super) async fn journal_best_effort(&self, entry: JournalEntry) {
        let job_id = entry.job_id;
        let result = if entry.is_settled() {
            self.inner.journal.forget(job_id).await
        } else {
            self.inner.journal.record(&entry).await
        };
        if let Err(e) = result {
            tracing::warn!(job_id = %job_id, error = %e, "Journal update failed");
        }
    }
}
