//! Application layer - Use cases and port interfaces
//!
//! Contains the job manager, the progress channel and the trait
//! definitions for external system interactions.

pub mod jobs;
pub mod ports;
pub mod progress;

// Re-export use cases
pub use jobs::{
    Capabilities, EngineSettings, EvictionReport, JobManager, JobResult, JobStatus,
    RecoveryReport, Submission,
};
pub use progress::ProgressChannel;
