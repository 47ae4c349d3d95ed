//! Job manager: owns job lifecycle and drives each job through the pipeline
//!
//! Blob Store -> Transcriber -> Extractor, with progress published on the
//! progress channel and the uploaded media deleted on every exit path.

mod maintenance;
mod pipeline;
mod settings;
mod slot;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use tokio::sync::Semaphore;

use crate::application::ports::{BlobStore, Extractor, JobJournal, Transcriber};
use crate::application::progress::ProgressChannel;
use crate::domain::error::JobError;
use crate::domain::job::{Job, JobFailure, JobId, JobState, Procedure, ProgressSnapshot, Stage};
use crate::domain::media::{MediaFormat, MediaKind, MediaPayload};

pub use maintenance::{EvictionReport, RecoveryReport};
pub use settings::EngineSettings;

use slot::JobSlot;

/// An upload as received from a client
#[derive(Debug, Clone)]
pub struct Submission {
    pub data: Bytes,
    /// Declared media kind, `audio` or `video`
    pub kind: String,
    /// Content-Type of the upload, used to pick the exact format when it matches the kind
    pub content_type: Option<String>,
    /// Non-owning label supplied by the caller
    pub client_ref: Option<String>,
}

impl Submission {
    pub fn new(data: impl Into<Bytes>, kind: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            kind: kind.into(),
            content_type: None,
            client_ref: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_client_ref(mut self, client_ref: impl Into<String>) -> Self {
        self.client_ref = Some(client_ref.into());
        self
    }
}

/// Read-only view of a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
    pub stage: Stage,
    pub percent: u8,
    pub message: Option<String>,
    pub failure: Option<JobFailure>,
    pub attempt: u32,
    pub retry_of: Option<JobId>,
    pub client_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a completed job
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub job_id: JobId,
    pub procedure: Procedure,
}

/// External collaborators of the manager
pub struct Capabilities {
    pub blobs: Arc<dyn BlobStore>,
    pub transcriber: Arc<dyn Transcriber>,
    pub extractor: Arc<dyn Extractor>,
    pub journal: Arc<dyn JobJournal>,
}

struct Inner {
    settings: EngineSettings,
    blobs: Arc<dyn BlobStore>,
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn Extractor>,
    journal: Arc<dyn JobJournal>,
    progress: Arc<ProgressChannel>,
    jobs: RwLock<HashMap<JobId, Arc<JobSlot>>>,
    permits: Arc<Semaphore>,
}

/// Media job manager. Cheap to clone; clones share the same job table.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

impl JobManager {
    pub fn new(settings: EngineSettings, capabilities: Capabilities) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1)));
        Self {
            inner: Arc::new(Inner {
                settings,
                blobs: capabilities.blobs,
                transcriber: capabilities.transcriber,
                extractor: capabilities.extractor,
                journal: capabilities.journal,
                progress: Arc::new(ProgressChannel::new()),
                jobs: RwLock::new(HashMap::new()),
                permits,
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Accept an upload, create its job and schedule the pipeline.
    ///
    /// # Returns
    /// The new job's id, with the job already in `Uploading`
    pub fn submit(&self, submission: Submission) -> Result<JobId, JobError> {
        let client_ref = submission.client_ref.clone();
        let payload = self.validate(submission)?;
        let job = Job::new(JobId::new(), payload.format(), client_ref);
        self.start(job, payload)
    }

    /// Caller-driven retry of a failed or cancelled job with a fresh upload
    pub fn resubmit(&self, previous: JobId, submission: Submission) -> Result<JobId, JobError> {
        let previous = self.live_slot(previous)?.snapshot();
        if !matches!(previous.state(), JobState::Failed | JobState::Cancelled) {
            return Err(JobError::invalid_state(previous.state(), "resubmit"));
        }
        let client_ref = submission
            .client_ref
            .clone()
            .or_else(|| previous.client_ref().map(str::to_string));
        let payload = self.validate(submission)?;
        let job = Job::retry(JobId::new(), payload.format(), client_ref, &previous);
        self.start(job, payload)
    }

    /// Drive a job through its remaining stages until it is terminal.
    /// Rejected while another pipeline for the job is active, or once the job is terminal.
    pub async fn advance(&self, job_id: JobId) -> Result<(), JobError> {
        let slot = self.live_slot(job_id)?;
        let state = slot.job().state();
        if state.is_terminal() {
            return Err(JobError::invalid_state(state, "advance"));
        }
        let guard = slot
            .try_activate()
            .ok_or_else(|| JobError::invalid_state(state, "advance"))?;
        self.drive(slot, guard).await;
        Ok(())
    }

    /// Cancel a job in `Uploading`, `Transcribing` or `Extracting`.
    ///
    /// Signals the outstanding capability call and waits up to the cancel
    /// timeout for the pipeline to acknowledge; after that the transition is forced.
    pub async fn cancel(&self, job_id: JobId) -> Result<(), JobError> {
        let slot = self.live_slot(job_id)?;
        slot.job().request_cancel()?;
        tracing::info!(job_id = %job_id, "Cancellation requested");

        let updates = self.inner.progress.subscribe(job_id);
        slot.cancel_token().cancel();

        let limit = self.inner.settings.cancel_timeout;
        let acknowledged = match updates {
            Some(updates) => tokio::time::timeout(limit.as_std(), async move {
                let mut updates = std::pin::pin!(updates);
                while let Some(snapshot) = updates.next().await {
                    if snapshot.is_terminal() {
                        return true;
                    }
                }
                false
            })
            .await
            .unwrap_or(false),
            None => false,
        };

        if !acknowledged {
            tracing::warn!(job_id = %job_id, timeout = %limit, "Pipeline did not acknowledge cancellation, forcing");
            self.force_cancel(&slot).await;
        }
        Ok(())
    }

    /// Current status of a job
    pub fn status(&self, job_id: JobId) -> Result<JobStatus, JobError> {
        let slot = self.live_slot(job_id)?;
        let job = slot.snapshot();
        let latest = self.inner.progress.latest(job_id);

        Ok(JobStatus {
            job_id,
            state: job.state(),
            stage: job.stage(),
            percent: latest.as_ref().map(|s| s.percent).unwrap_or(0),
            message: latest.and_then(|s| s.message),
            failure: job.failure().cloned(),
            attempt: job.attempt(),
            retry_of: job.retry_of(),
            client_ref: job.client_ref().map(str::to_string),
            created_at: job.created_at(),
        })
    }

    /// Result of a completed job. Marks the job collected.
    pub fn result(&self, job_id: JobId) -> Result<JobResult, JobError> {
        let slot = self.live_slot(job_id)?;
        let mut job = slot.job();
        let Some(procedure) = job.procedure().cloned() else {
            return Err(JobError::NotReady {
                state: job.state().to_string(),
            });
        };
        job.mark_collected();
        Ok(JobResult { job_id, procedure })
    }

    /// Most recent progress snapshot
    pub fn latest_progress(&self, job_id: JobId) -> Result<ProgressSnapshot, JobError> {
        self.live_slot(job_id)?;
        self.inner
            .progress
            .latest(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Stream of progress snapshots ending after the terminal one
    pub fn subscribe(
        &self,
        job_id: JobId,
    ) -> Result<impl Stream<Item = ProgressSnapshot> + Send + 'static, JobError> {
        self.live_slot(job_id)?;
        self.inner
            .progress
            .subscribe(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Ids of all registered jobs
    pub fn job_ids(&self) -> Vec<JobId> {
        self.slots().into_iter().map(|(id, _)| id).collect()
    }

    fn validate(&self, submission: Submission) -> Result<MediaPayload, JobError> {
        let kind: MediaKind = submission.kind.parse()?;
        if submission.data.is_empty() {
            return Err(JobError::InvalidInput("media payload is empty".to_string()));
        }
        let max = self.inner.settings.max_upload;
        if submission.data.len() as u64 > max.as_bytes() {
            return Err(JobError::InvalidInput(format!(
                "media payload exceeds the {} limit",
                max.human_readable()
            )));
        }

        let format = submission
            .content_type
            .as_deref()
            .and_then(MediaFormat::from_mime)
            .filter(|f| f.kind() == kind)
            .unwrap_or_else(|| kind.default_format());
        Ok(MediaPayload::new(submission.data, format))
    }

    fn start(&self, mut job: Job, payload: MediaPayload) -> Result<JobId, JobError> {
        let job_id = job.id();
        job.start_upload()?;
        tracing::info!(
            job_id = %job_id,
            format = %payload.format(),
            size = %payload.human_readable_size(),
            attempt = job.attempt(),
            "Job submitted"
        );

        let slot = Arc::new(JobSlot::new(job, Some(payload)));
        let guard = slot
            .try_activate()
            .ok_or_else(|| JobError::InternalFailure("fresh job already active".to_string()))?;

        self.inner.progress.open(job_id);
        self.inner.progress.publish(
            job_id,
            JobState::Uploading,
            Stage::Uploading,
            0,
            None,
        );
        match self.inner.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(job_id, Arc::clone(&slot));
            }
            Err(e) => {
                tracing::error!("RwLock poisoned writing job table: {e}");
                self.inner.progress.close(job_id);
                return Err(JobError::InternalFailure("job table unavailable".to_string()));
            }
        }

        let manager = self.clone();
        tokio::spawn(async move { manager.drive(slot, guard).await });
        Ok(job_id)
    }

    fn slot(&self, job_id: JobId) -> Option<Arc<JobSlot>> {
        match self.inner.jobs.read() {
            Ok(jobs) => jobs.get(&job_id).cloned(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading job table: {e}");
                None
            }
        }
    }

    fn slots(&self) -> Vec<(JobId, Arc<JobSlot>)> {
        match self.inner.jobs.read() {
            Ok(jobs) => jobs.iter().map(|(id, s)| (*id, Arc::clone(s))).collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading job table: {e}");
                Vec::new()
            }
        }
    }

    /// Look up a job, evicting it on the spot if its retention has lapsed
    fn live_slot(&self, job_id: JobId) -> Result<Arc<JobSlot>, JobError> {
        let slot = self
            .slot(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        if self.is_expired(&slot.job(), Utc::now()) {
            self.remove(job_id);
            return Err(JobError::NotFound(job_id.to_string()));
        }
        Ok(slot)
    }

    fn remove(&self, job_id: JobId) {
        match self.inner.jobs.write() {
            Ok(mut jobs) => {
                jobs.remove(&job_id);
            }
            Err(e) => tracing::error!("RwLock poisoned writing job table: {e}"),
        }
        self.inner.progress.close(job_id);
        tracing::debug!(job_id = %job_id, "Job evicted");
    }
}
