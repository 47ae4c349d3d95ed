//! Per-job bookkeeping held by the manager

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::domain::job::{BlobHandle, Job};
use crate::domain::media::MediaPayload;

/// A registered job plus the state its pipeline needs.
/// The job record has a single writer at a time; no lock is held across an await.
pub(crate) struct JobSlot {
    job: Mutex<Job>,
    /// Upload waiting for its pipeline to pick it up
    pending: Mutex<Option<MediaPayload>>,
    /// Handles whose deletion was attempted and not confirmed
    undeleted: Mutex<Vec<BlobHandle>>,
    cancel: CancellationToken,
    active: AtomicBool,
}

impl JobSlot {
    pub(crate) fn new(job: Job, payload: Option<MediaPayload>) -> Self {
        Self {
            job: Mutex::new(job),
            pending: Mutex::new(payload),
            undeleted: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            active: AtomicBool::new(false),
        }
    }

    pub(crate) fn job(&self) -> MutexGuard<'_, Job> {
        self.job.lock().unwrap_or_else(|e| {
            tracing::error!("Mutex poisoned locking job record: {e}");
            e.into_inner()
        })
    }

    /// Clone of the current job record
    pub(crate) fn snapshot(&self) -> Job {
        self.job().clone()
    }

    pub(crate) fn take_payload(&self) -> Option<MediaPayload> {
        match self.pending.lock() {
            Ok(mut pending) => pending.take(),
            Err(e) => e.into_inner().take(),
        }
    }

    pub(crate) fn push_undeleted(&self, handle: BlobHandle) {
        match self.undeleted.lock() {
            Ok(mut undeleted) => undeleted.push(handle),
            Err(e) => e.into_inner().push(handle),
        }
    }

    pub(crate) fn take_undeleted(&self) -> Vec<BlobHandle> {
        match self.undeleted.lock() {
            Ok(mut undeleted) => std::mem::take(&mut *undeleted),
            Err(e) => std::mem::take(&mut *e.into_inner()),
        }
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Claim the single active-pipeline slot for this job
    pub(crate) fn try_activate(self: &Arc<Self>) -> Option<ActiveGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActiveGuard {
                slot: Arc::clone(self),
            })
    }
}

/// Releases the active flag when the pipeline ends, including by panic
pub(crate) struct ActiveGuard {
    slot: Arc<JobSlot>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.slot.active.store(false, Ordering::Release);
    }
}
