//! Domain layer - Core business logic
//!
//! Contains value objects, entities, and domain errors.
//! This layer has no dependencies on external systems.

pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod units;

// Re-export common types
pub use config::AppConfig;
pub use error::*;
pub use job::{
    BlobHandle, BlobSlot, FailureKind, Job, JobFailure, JobId, JobState, Procedure,
    ProgressSnapshot, Stage, StageWeights, StepList, Transcript,
};
pub use media::{MediaFormat, MediaKind, MediaPayload};
pub use units::{ByteSize, Duration};
