//! Job journal port

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::job::{BlobHandle, Job, JobId, JobState, Stage};

/// Journal errors
#[derive(Debug, Clone, Error)]
pub enum JournalError {
    #[error("Journal I/O failed: {0}")]
    Io(String),

    #[error("Failed to encode journal entry: {0}")]
    Encoding(String),
}

/// Durable record of a job's blob ownership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub job_id: JobId,
    pub state: JobState,
    pub stage: Stage,
    pub blob: Option<BlobHandle>,
    pub blob_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Snapshot a job. `blob` is the handle the job owns or owned.
    pub fn for_job(job: &Job, blob: Option<BlobHandle>, blob_deleted: bool) -> Self {
        Self {
            job_id: job.id(),
            state: job.state(),
            stage: job.stage(),
            blob,
            blob_deleted,
            created_at: job.created_at(),
            updated_at: Utc::now(),
        }
    }

    /// Nothing left to recover: the job ended and its media is confirmed gone
    pub fn is_settled(&self) -> bool {
        self.state.is_terminal() && (self.blob.is_none() || self.blob_deleted)
    }
}

/// Port for the durable deletion ledger used by crash recovery
#[async_trait]
pub trait JobJournal: Send + Sync {
    /// Insert or replace the entry for a job
    async fn record(&self, entry: &JournalEntry) -> Result<(), JournalError>;

    /// All entries still on record
    async fn entries(&self) -> Result<Vec<JournalEntry>, JournalError>;

    /// Drop the entry for a job. Idempotent.
    async fn forget(&self, job_id: JobId) -> Result<(), JournalError>;
}
