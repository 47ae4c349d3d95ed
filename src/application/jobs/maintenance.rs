//! Startup recovery, retention and shutdown

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::pipeline::Interrupt;
use super::slot::JobSlot;
use super::JobManager;
use crate::domain::error::JobError;
use crate::domain::job::{BlobHandle, BlobSlot, Job, JobState};

/// Outcome of a recovery sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Unconfirmed blobs deleted
    pub blobs_deleted: usize,
    /// Blobs found in the store with no owner, deleted
    pub orphans_deleted: usize,
    /// Non-terminal jobs re-registered as failed
    pub jobs_interrupted: usize,
    /// Deletions that failed again and stay on record
    pub deletion_failures: usize,
}

/// Outcome of a retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: usize,
    /// Non-terminal jobs found without a running pipeline and failed
    pub stalled: usize,
}

impl JobManager {
    /// Startup sweep over the journal and the blob store.
    ///
    /// Every blob whose deletion was never confirmed is force-deleted, jobs that
    /// were mid-pipeline are re-registered as failed, and blobs referenced by
    /// nothing are deleted as orphans.
    pub async fn recover(&self) -> Result<RecoveryReport, JobError> {
        let mut report = RecoveryReport::default();
        let entries = self
            .inner
            .journal
            .entries()
            .await
            .map_err(|e| JobError::InternalFailure(format!("journal read failed: {}", e)))?;

        let mut known: HashSet<BlobHandle> = HashSet::new();
        for entry in entries {
            let mut deletion_confirmed = true;
            if let Some(handle) = entry.blob.as_ref().filter(|_| !entry.blob_deleted) {
                known.insert(handle.clone());
                match self.inner.blobs.force_delete(handle).await {
                    Ok(_) => report.blobs_deleted += 1,
                    Err(e) => {
                        deletion_confirmed = false;
                        report.deletion_failures += 1;
                        tracing::error!(
                            target: "labscribe::privacy",
                            job_id = %entry.job_id,
                            blob = %handle,
                            error = %e,
                            "Failed to delete media left by a previous run"
                        );
                    }
                }
            }

            if !entry.state.is_terminal() && self.slot(entry.job_id).is_none() {
                self.register_interrupted(Job::interrupted(entry.job_id, entry.stage, entry.created_at));
                report.jobs_interrupted += 1;
            }

            let result = if deletion_confirmed {
                self.inner.journal.forget(entry.job_id).await
            } else {
                let mut kept = entry.clone();
                kept.state = JobState::Failed;
                kept.updated_at = Utc::now();
                self.inner.journal.record(&kept).await
            };
            if let Err(e) = result {
                tracing::warn!(job_id = %entry.job_id, error = %e, "Journal update failed during recovery");
            }
        }

        let held = self.held_blobs();
        let stored = self
            .inner
            .blobs
            .list()
            .await
            .map_err(|e| JobError::InternalFailure(format!("blob listing failed: {}", e)))?;
        for handle in stored {
            if known.contains(&handle) || held.contains(&handle) {
                continue;
            }
            match self.inner.blobs.force_delete(&handle).await {
                Ok(true) => report.orphans_deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    report.deletion_failures += 1;
                    tracing::error!(
                        target: "labscribe::privacy",
                        blob = %handle,
                        error = %e,
                        "Failed to delete orphaned media"
                    );
                }
            }
        }

        tracing::info!(
            blobs_deleted = report.blobs_deleted,
            orphans_deleted = report.orphans_deleted,
            jobs_interrupted = report.jobs_interrupted,
            deletion_failures = report.deletion_failures,
            "Recovery sweep finished"
        );
        Ok(report)
    }

    /// Drop terminal jobs past their retention, and fail jobs whose pipeline
    /// stopped without reaching a terminal state.
    pub async fn evict_expired(&self) -> EvictionReport {
        let mut report = EvictionReport::default();
        let now = Utc::now();

        for (job_id, slot) in self.slots() {
            let (expired, stalled) = {
                let job = slot.job();
                (
                    self.is_expired(&job, now),
                    !job.is_terminal() && !slot.is_active(),
                )
            };
            if expired {
                self.remove(job_id);
                report.evicted += 1;
            } else if stalled {
                tracing::error!(job_id = %job_id, "Pipeline stopped without finishing, failing job");
                self.finish_interrupted(
                    &slot,
                    Interrupt::Failed(JobError::InternalFailure(
                        "processing stopped unexpectedly".to_string(),
                    )),
                )
                .await;
                report.stalled += 1;
            }
        }

        if report.evicted > 0 || report.stalled > 0 {
            tracing::debug!(evicted = report.evicted, stalled = report.stalled, "Retention sweep");
        }
        report
    }

    /// Cancel every running pipeline so no uploaded media outlives the process
    pub async fn shutdown(&self) {
        let running: Vec<_> = self
            .slots()
            .into_iter()
            .filter(|(_, slot)| !slot.job().is_terminal())
            .map(|(job_id, _)| job_id)
            .collect();
        if running.is_empty() {
            return;
        }

        tracing::info!(jobs = running.len(), "Cancelling running jobs for shutdown");
        let cancellations = running.iter().map(|job_id| async move {
            if let Err(e) = self.cancel(*job_id).await {
                tracing::debug!(job_id = %job_id, "Skipped during shutdown: {e}");
            }
        });
        futures::future::join_all(cancellations).await;
    }

    pub(super) fn is_expired(&self, job: &Job, now: DateTime<Utc>) -> bool {
        let settings = &self.inner.settings;
        let elapsed_since = |at: Option<DateTime<Utc>>| at.and_then(|at| (now - at).to_std().ok());

        if !job.is_terminal() {
            return false;
        }
        let ttl_lapsed = elapsed_since(job.finished_at())
            .map(|elapsed| elapsed >= settings.result_ttl.as_std())
            .unwrap_or(false);
        let grace_lapsed = elapsed_since(job.collected_at())
            .map(|elapsed| elapsed >= settings.collected_grace.as_std())
            .unwrap_or(false);
        ttl_lapsed || grace_lapsed
    }

    fn register_interrupted(&self, job: Job) {
        let job_id = job.id();
        let (state, stage) = (job.state(), job.stage());
        let message = job.failure().map(|f| f.message.clone());
        let slot = Arc::new(JobSlot::new(job, None));

        self.inner.progress.open(job_id);
        self.inner.progress.publish(job_id, state, stage, 0, message);
        match self.inner.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(job_id, slot);
            }
            Err(e) => tracing::error!("RwLock poisoned writing job table: {e}"),
        }
        tracing::warn!(job_id = %job_id, stage = %stage, "Job interrupted by restart");
    }

    fn held_blobs(&self) -> HashSet<BlobHandle> {
        self.slots()
            .into_iter()
            .filter_map(|(_, slot)| match slot.job().blob() {
                BlobSlot::Stored(handle) => Some(handle.clone()),
                _ => None,
            })
            .collect()
    }
}
