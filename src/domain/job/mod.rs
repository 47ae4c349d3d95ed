//! Job domain module

mod id;
#[allow(clippy::module_inception)]
mod job;
mod procedure;
mod progress;
mod state;
mod transcript;

pub use id::{BlobHandle, JobId};
pub use job::{BlobSlot, FailureKind, Job, JobFailure};
pub use procedure::{Extraction, Procedure, ProcedureMetadata, ProcedureStep, StepList, CONFIDENTIALITY_NOTICE};
pub use progress::{ProgressSnapshot, StageWeights};
pub use state::{InvalidStateTransition, JobState, Stage};
pub use transcript::{parse_timestamp, Transcript, TranscriptSegment};
