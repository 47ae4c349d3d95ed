//! Shared state for the HTTP handlers

use std::sync::Arc;
use std::time::Instant;

use crate::application::jobs::JobManager;

pub struct AppState {
    pub start_time: Instant,
    pub jobs: JobManager,
}

impl AppState {
    pub fn new(jobs: JobManager) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            jobs,
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
