//! In-memory job journal

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::ports::{JobJournal, JournalEntry, JournalError};
use crate::domain::job::JobId;

/// Journal that lives only as long as the process. Used when no journal
/// directory is configured, and by tests.
#[derive(Default)]
pub struct InMemoryJournal {
    entries: Mutex<HashMap<JobId, JournalEntry>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Journal pre-populated with entries, as if left behind by a previous run
    pub fn with_entries(entries: impl IntoIterator<Item = JournalEntry>) -> Self {
        Self {
            entries: Mutex::new(entries.into_iter().map(|e| (e.job_id, e)).collect()),
        }
    }

    pub fn get(&self, job_id: JobId) -> Option<JournalEntry> {
        self.lock().get(&job_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, JournalEntry>> {
        self.entries.lock().unwrap_or_else(|e| {
            tracing::error!("Mutex poisoned locking journal: {e}");
            e.into_inner()
        })
    }
}

#[async_trait]
impl JobJournal for InMemoryJournal {
    async fn record(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        self.lock().insert(entry.job_id, entry.clone());
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<JournalEntry>, JournalError> {
        Ok(self.lock().values().cloned().collect())
    }

    async fn forget(&self, job_id: JobId) -> Result<(), JournalError> {
        self.lock().remove(&job_id);
        Ok(())
    }
}
