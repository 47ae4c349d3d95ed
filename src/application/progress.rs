//! Progress channel: ordered, coalescing delivery of job snapshots.
//!
//! Each job has one `watch` channel. Publishing never blocks, slow subscribers
//! observe the latest snapshot only, and a subscriber that has not yet seen the
//! terminal snapshot still receives it after the job ends.

use std::collections::HashMap;
use std::sync::RwLock;

use futures::Stream;
use tokio::sync::watch;

use crate::domain::job::{JobId, JobState, ProgressSnapshot, Stage};

/// Per-job progress broadcaster
#[derive(Default)]
pub struct ProgressChannel {
    senders: RwLock<HashMap<JobId, watch::Sender<ProgressSnapshot>>>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the channel for a new job with a `Created` snapshot at 0%.
    /// Reopening an existing job keeps its current channel.
    pub fn open(&self, job_id: JobId) {
        let initial = ProgressSnapshot {
            job_id,
            sequence: 0,
            state: JobState::Created,
            stage: Stage::Uploading,
            percent: 0,
            message: None,
        };
        match self.senders.write() {
            Ok(mut senders) => {
                senders
                    .entry(job_id)
                    .or_insert_with(|| watch::channel(initial).0);
            }
            Err(e) => tracing::error!("RwLock poisoned writing progress channels: {e}"),
        }
    }

    /// Publish a snapshot.
    ///
    /// The channel assigns the sequence number and clamps the percent so it
    /// never decreases; `Completed` is always 100. Nothing is published once
    /// a terminal snapshot went out.
    ///
    /// # Returns
    /// The snapshot as published, or None if the job is unknown or already terminal
    pub fn publish(
        &self,
        job_id: JobId,
        state: JobState,
        stage: Stage,
        percent: u8,
        message: Option<String>,
    ) -> Option<ProgressSnapshot> {
        let senders = match self.senders.read() {
            Ok(senders) => senders,
            Err(e) => {
                tracing::error!("RwLock poisoned reading progress channels: {e}");
                return None;
            }
        };
        let sender = senders.get(&job_id)?;

        let mut published = None;
        sender.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            let percent = if state == JobState::Completed {
                100
            } else {
                percent.min(100).max(current.percent)
            };
            *current = ProgressSnapshot {
                job_id,
                sequence: current.sequence + 1,
                state,
                stage,
                percent,
                message: message.clone(),
            };
            published = Some(current.clone());
            true
        });

        if let Some(snapshot) = &published {
            tracing::debug!(
                job_id = %job_id,
                sequence = snapshot.sequence,
                state = %snapshot.state,
                percent = snapshot.percent,
                "Progress published"
            );
        }
        published
    }

    /// Most recent snapshot for a job
    pub fn latest(&self, job_id: JobId) -> Option<ProgressSnapshot> {
        match self.senders.read() {
            Ok(senders) => senders.get(&job_id).map(|s| s.borrow().clone()),
            Err(e) => {
                tracing::error!("RwLock poisoned reading progress channels: {e}");
                None
            }
        }
    }

    /// Lazy, finite stream of snapshots. Starts with the current snapshot and
    /// ends right after the first terminal one, or when the channel is closed.
    pub fn subscribe(
        &self,
        job_id: JobId,
    ) -> Option<impl Stream<Item = ProgressSnapshot> + Send + 'static> {
        let mut rx = match self.senders.read() {
            Ok(senders) => senders.get(&job_id)?.subscribe(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading progress channels: {e}");
                return None;
            }
        };

        Some(async_stream::stream! {
            let current = rx.borrow_and_update().clone();
            let done = current.is_terminal();
            yield current;
            if done {
                return;
            }
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                let done = snapshot.is_terminal();
                yield snapshot;
                if done {
                    break;
                }
            }
        })
    }

    /// Drop a job's channel. Open subscriptions end after draining.
    pub fn close(&self, job_id: JobId) {
        match self.senders.write() {
            Ok(mut senders) => {
                senders.remove(&job_id);
            }
            Err(e) => tracing::error!("RwLock poisoned writing progress channels: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn open_publishes_initial_snapshot() {
        let channel = ProgressChannel::new();
        let id = JobId::new();
        channel.open(id);

        let latest = channel.latest(id).unwrap();
        assert_eq!(latest.sequence, 0);
        assert_eq!(latest.state, JobState::Created);
        assert_eq!(latest.percent, 0);
    }

    #[test]
    fn publish_to_unknown_job_is_ignored() {
        let channel = ProgressChannel::new();
        assert!(channel
            .publish(JobId::new(), JobState::Uploading, Stage::Uploading, 5, None)
            .is_none());
    }

    #[test]
    fn sequence_increases_and_percent_never_decreases() {
        let channel = ProgressChannel::new();
        let id = JobId::new();
        channel.open(id);

        let a = channel
            .publish(id, JobState::Transcribing, Stage::Transcribing, 40, None)
            .unwrap();
        let b = channel
            .publish(id, JobState::Transcribing, Stage::Transcribing, 20, None)
            .unwrap();

        assert!(b.sequence > a.sequence);
        assert_eq!(b.percent, 40);
    }

    #[test]
    fn completed_is_always_100() {
        let channel = ProgressChannel::new();
        let id = JobId::new();
        channel.open(id);

        let done = channel
            .publish(id, JobState::Completed, Stage::Extracting, 85, None)
            .unwrap();
        assert_eq!(done.percent, 100);
    }

    #[test]
    fn nothing_published_after_terminal() {
        let channel = ProgressChannel::new();
        let id = JobId::new();
        channel.open(id);

        channel.publish(id, JobState::Failed, Stage::Transcribing, 30, Some("boom".into()));
        assert!(channel
            .publish(id, JobState::Extracting, Stage::Extracting, 90, None)
            .is_none());
        assert_eq!(channel.latest(id).unwrap().state, JobState::Failed);
        assert_eq!(channel.latest(id).unwrap().percent, 30);
    }

    #[tokio::test]
    async fn subscriber_ends_after_terminal_snapshot() {
        let channel = ProgressChannel::new();
        let id = JobId::new();
        channel.open(id);
        let stream = channel.subscribe(id).unwrap();

        channel.publish(id, JobState::Uploading, Stage::Uploading, 5, None);
        channel.publish(id, JobState::Transcribing, Stage::Transcribing, 50, None);
        channel.publish(id, JobState::Cancelled, Stage::Transcribing, 50, None);

        let seen: Vec<ProgressSnapshot> = stream.collect().await;
        let last = seen.last().unwrap();
        assert_eq!(last.state, JobState::Cancelled);
        assert!(seen.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[tokio::test]
    async fn slow_subscriber_sees_coalesced_but_terminal_snapshot() {
        let channel = ProgressChannel::new();
        let id = JobId::new();
        channel.open(id);
        let stream = channel.subscribe(id).unwrap();

        for percent in 1..=9 {
            channel.publish(id, JobState::Uploading, Stage::Uploading, percent, None);
        }
        channel.publish(id, JobState::Completed, Stage::Extracting, 100, None);
        channel.close(id);

        let seen: Vec<ProgressSnapshot> = stream.collect().await;
        assert!(seen.len() <= 11);
        assert_eq!(seen.last().unwrap().state, JobState::Completed);
    }

    #[tokio::test]
    async fn subscribe_after_terminal_yields_single_snapshot() {
        let channel = ProgressChannel::new();
        let id = JobId::new();
        channel.open(id);
        channel.publish(id, JobState::Completed, Stage::Extracting, 100, None);

        let seen: Vec<ProgressSnapshot> = channel.subscribe(id).unwrap().collect().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].percent, 100);
    }

    #[tokio::test]
    async fn closing_ends_open_subscriptions() {
        let channel = ProgressChannel::new();
        let id = JobId::new();
        channel.open(id);
        let stream = channel.subscribe(id).unwrap();
        channel.close(id);

        let seen: Vec<ProgressSnapshot> = stream.collect().await;
        assert_eq!(seen.len(), 1);
        assert!(channel.latest(id).is_none());
    }
}
