//! Job entity

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{BlobHandle, JobId};
use super::procedure::Procedure;
use super::state::{InvalidStateTransition, JobState, Stage};
use crate::domain::error::JobError;
use crate::domain::media::MediaFormat;

/// What a job holds of its uploaded media
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BlobSlot {
    #[default]
    Empty,
    Stored(BlobHandle),
    Deleted,
}

/// Category of a job failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    CapabilityError,
    InternalFailure,
}

impl FailureKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::CapabilityError => "capability_error",
            Self::InternalFailure => "internal_failure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why and where a job failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub stage: Stage,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            message: message.into(),
        }
    }

    /// Classify a stage error
    pub fn from_error(stage: Stage, err: &JobError) -> Self {
        let kind = match err {
            JobError::Timeout { .. } => FailureKind::Timeout,
            JobError::CapabilityError(_) => FailureKind::CapabilityError,
            _ => FailureKind::InternalFailure,
        };
        Self::new(kind, stage, err.to_string())
    }
}

/// A unit of work: one uploaded recording on its way to a procedure.
///
/// Invariants enforced here: terminal states accept no mutation, and a blob
/// slot that has left `Stored` never returns to it.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    state: JobState,
    stage: Stage,
    format: MediaFormat,
    created_at: DateTime<Utc>,
    client_ref: Option<String>,
    blob: BlobSlot,
    procedure: Option<Procedure>,
    failure: Option<JobFailure>,
    attempt: u32,
    retry_of: Option<JobId>,
    cancel_requested: bool,
    finished_at: Option<DateTime<Utc>>,
    collected_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a first-attempt job in `Created`
    pub fn new(id: JobId, format: MediaFormat, client_ref: Option<String>) -> Self {
        Self {
            id,
            state: JobState::Created,
            stage: Stage::Uploading,
            format,
            created_at: Utc::now(),
            client_ref,
            blob: BlobSlot::Empty,
            procedure: None,
            failure: None,
            attempt: 1,
            retry_of: None,
            cancel_requested: false,
            finished_at: None,
            collected_at: None,
        }
    }

    /// Create a job that retries `previous`
    pub fn retry(id: JobId, format: MediaFormat, client_ref: Option<String>, previous: &Job) -> Self {
        Self {
            attempt: previous.attempt + 1,
            retry_of: Some(previous.id),
            ..Self::new(id, format, client_ref)
        }
    }

    /// Rebuild a job that was interrupted by a restart. It is registered as failed.
    pub fn interrupted(id: JobId, stage: Stage, created_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            state: JobState::Failed,
            stage,
            created_at,
            blob: BlobSlot::Deleted,
            failure: Some(JobFailure::new(
                FailureKind::InternalFailure,
                stage,
                "interrupted by restart",
            )),
            finished_at: Some(now),
            ..Self::new(id, MediaFormat::Mp3, None)
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Last stage the job entered
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn client_ref(&self) -> Option<&str> {
        self.client_ref.as_deref()
    }

    pub fn blob(&self) -> &BlobSlot {
        &self.blob
    }

    pub fn procedure(&self) -> Option<&Procedure> {
        self.procedure.as_ref()
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        self.failure.as_ref()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn retry_of(&self) -> Option<JobId> {
        self.retry_of
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn collected_at(&self) -> Option<DateTime<Utc>> {
        self.collected_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn require(&self, expected: JobState, action: &str) -> Result<(), InvalidStateTransition> {
        if self.state != expected {
            return Err(InvalidStateTransition::new(self.state, action));
        }
        Ok(())
    }

    fn require_active(&self, action: &str) -> Result<(), InvalidStateTransition> {
        if self.state.is_terminal() {
            return Err(InvalidStateTransition::new(self.state, action));
        }
        Ok(())
    }

    fn finish(&mut self, state: JobState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    /// CREATED -> UPLOADING
    pub fn start_upload(&mut self) -> Result<(), InvalidStateTransition> {
        self.require(JobState::Created, "start upload")?;
        self.state = JobState::Uploading;
        self.stage = Stage::Uploading;
        Ok(())
    }

    /// Record the handle the media is being written under.
    /// Only valid once, while uploading.
    pub fn attach_blob(&mut self, handle: BlobHandle) -> Result<(), InvalidStateTransition> {
        self.require(JobState::Uploading, "attach blob")?;
        if self.blob != BlobSlot::Empty {
            return Err(InvalidStateTransition::new(self.state, "attach a second blob"));
        }
        self.blob = BlobSlot::Stored(handle);
        Ok(())
    }

    /// UPLOADING -> TRANSCRIBING. Requires the blob to be stored.
    pub fn begin_transcription(&mut self) -> Result<(), InvalidStateTransition> {
        self.require(JobState::Uploading, "begin transcription")?;
        if !matches!(self.blob, BlobSlot::Stored(_)) {
            return Err(InvalidStateTransition::new(
                self.state,
                "begin transcription without a stored blob",
            ));
        }
        self.state = JobState::Transcribing;
        self.stage = Stage::Transcribing;
        Ok(())
    }

    /// Give up the blob handle. The slot moves to `Deleted` and the caller
    /// becomes responsible for deleting the bytes.
    pub fn take_blob(&mut self) -> Option<BlobHandle> {
        match std::mem::replace(&mut self.blob, BlobSlot::Deleted) {
            BlobSlot::Stored(handle) => Some(handle),
            BlobSlot::Empty => {
                self.blob = BlobSlot::Empty;
                None
            }
            BlobSlot::Deleted => None,
        }
    }

    /// TRANSCRIBING -> EXTRACTING. The blob must already be gone.
    pub fn begin_extraction(&mut self) -> Result<(), InvalidStateTransition> {
        self.require(JobState::Transcribing, "begin extraction")?;
        if self.blob != BlobSlot::Deleted {
            return Err(InvalidStateTransition::new(
                self.state,
                "begin extraction while media is still stored",
            ));
        }
        self.state = JobState::Extracting;
        self.stage = Stage::Extracting;
        Ok(())
    }

    /// EXTRACTING -> COMPLETED
    pub fn complete(&mut self, procedure: Procedure) -> Result<(), InvalidStateTransition> {
        self.require(JobState::Extracting, "complete")?;
        self.procedure = Some(procedure);
        self.finish(JobState::Completed);
        Ok(())
    }

    /// Any non-terminal state -> FAILED
    pub fn fail(&mut self, failure: JobFailure) -> Result<(), InvalidStateTransition> {
        self.require_active("fail")?;
        self.failure = Some(failure);
        self.finish(JobState::Failed);
        Ok(())
    }

    /// Mark that cancellation was requested. Rejected on terminal jobs and
    /// when a cancellation is already pending.
    pub fn request_cancel(&mut self) -> Result<(), InvalidStateTransition> {
        if !self.state.is_processing() || self.cancel_requested {
            return Err(InvalidStateTransition::new(self.state, "cancel"));
        }
        self.cancel_requested = true;
        Ok(())
    }

    /// Any non-terminal state -> CANCELLED
    pub fn cancel(&mut self) -> Result<(), InvalidStateTransition> {
        self.require_active("cancel")?;
        self.finish(JobState::Cancelled);
        Ok(())
    }

    /// Record that the result was handed to a client
    pub fn mark_collected(&mut self) {
        if self.collected_at.is_none() {
            self.collected_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::procedure::{Extraction, ProcedureStep};

    fn uploading_job() -> Job {
        let mut job = Job::new(JobId::new(), MediaFormat::Mp3, None);
        job.start_upload().unwrap();
        job
    }

    fn procedure() -> Procedure {
        Procedure::from_extraction(Extraction {
            summary: None,
            steps: vec![ProcedureStep::new("Mix")],
        })
        .unwrap()
    }

    #[test]
    fn new_job_is_created() {
        let job = Job::new(JobId::new(), MediaFormat::Mp3, Some("bench-3".to_string()));
        assert_eq!(job.state(), JobState::Created);
        assert_eq!(job.attempt(), 1);
        assert_eq!(job.client_ref(), Some("bench-3"));
        assert_eq!(job.blob(), &BlobSlot::Empty);
    }

    #[test]
    fn happy_path_transitions() {
        let mut job = uploading_job();
        let handle = BlobHandle::new();
        job.attach_blob(handle.clone()).unwrap();
        job.begin_transcription().unwrap();
        assert_eq!(job.take_blob(), Some(handle));
        assert_eq!(job.blob(), &BlobSlot::Deleted);
        job.begin_extraction().unwrap();
        job.complete(procedure()).unwrap();
        assert_eq!(job.state(), JobState::Completed);
        assert!(job.finished_at().is_some());
        assert!(job.procedure().is_some());
    }

    #[test]
    fn transcription_requires_stored_blob() {
        let mut job = uploading_job();
        let err = job.begin_transcription().unwrap_err();
        assert_eq!(err.current_state, JobState::Uploading);
    }

    #[test]
    fn extraction_requires_deleted_blob() {
        let mut job = uploading_job();
        job.attach_blob(BlobHandle::new()).unwrap();
        job.begin_transcription().unwrap();
        assert!(job.begin_extraction().is_err());
    }

    #[test]
    fn blob_never_returns_to_stored() {
        let mut job = uploading_job();
        job.attach_blob(BlobHandle::new()).unwrap();
        job.take_blob();
        assert!(job.attach_blob(BlobHandle::new()).is_err());
        assert_eq!(job.take_blob(), None);
    }

    #[test]
    fn take_blob_on_empty_slot_keeps_it_empty() {
        let mut job = uploading_job();
        assert_eq!(job.take_blob(), None);
        assert_eq!(job.blob(), &BlobSlot::Empty);
    }

    #[test]
    fn terminal_jobs_reject_mutation() {
        let mut job = uploading_job();
        job.cancel().unwrap();
        assert!(job.fail(JobFailure::new(FailureKind::Timeout, Stage::Uploading, "late")).is_err());
        assert!(job.cancel().is_err());
        assert!(job.request_cancel().is_err());
        assert!(job.attach_blob(BlobHandle::new()).is_err());
    }

    #[test]
    fn second_cancel_request_is_rejected() {
        let mut job = uploading_job();
        job.request_cancel().unwrap();
        let err = job.request_cancel().unwrap_err();
        assert_eq!(err.action, "cancel");
    }

    #[test]
    fn cancel_request_rejected_before_upload_starts() {
        let mut job = Job::new(JobId::new(), MediaFormat::Mp3, None);
        assert!(job.request_cancel().is_err());
    }

    #[test]
    fn retry_links_previous_attempt() {
        let mut first = uploading_job();
        first
            .fail(JobFailure::new(FailureKind::CapabilityError, Stage::Transcribing, "boom"))
            .unwrap();
        let second = Job::retry(JobId::new(), MediaFormat::Wav, None, &first);
        assert_eq!(second.attempt(), 2);
        assert_eq!(second.retry_of(), Some(first.id()));
        assert_eq!(second.state(), JobState::Created);
    }

    #[test]
    fn interrupted_job_is_failed_internally() {
        let job = Job::interrupted(JobId::new(), Stage::Transcribing, Utc::now());
        assert_eq!(job.state(), JobState::Failed);
        let failure = job.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::InternalFailure);
        assert_eq!(failure.message, "interrupted by restart");
    }

    #[test]
    fn failure_classification() {
        let timeout = JobError::Timeout {
            stage: "transcribing".to_string(),
            after: "1s".to_string(),
        };
        assert_eq!(
            JobFailure::from_error(Stage::Transcribing, &timeout).kind,
            FailureKind::Timeout
        );
        assert_eq!(
            JobFailure::from_error(Stage::Extracting, &JobError::CapabilityError("x".into())).kind,
            FailureKind::CapabilityError
        );
        assert_eq!(
            JobFailure::from_error(Stage::Uploading, &JobError::InternalFailure("x".into())).kind,
            FailureKind::InternalFailure
        );
    }

    #[test]
    fn collected_timestamp_is_set_once() {
        let mut job = uploading_job();
        job.mark_collected();
        let first = job.collected_at();
        job.mark_collected();
        assert_eq!(job.collected_at(), first);
    }
}
