//! Filesystem job journal: one JSON file per job

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::{JobJournal, JournalEntry, JournalError};
use crate::domain::job::JobId;

/// Journal persisted as `<dir>/<job_id>.json`, replaced atomically on every record
pub struct FsJournal {
    dir: PathBuf,
}

impl FsJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, job_id: JobId) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }
}

#[async_trait]
impl JobJournal for FsJournal {
    async fn record(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| JournalError::Io(e.to_string()))?;

        let content = serde_json::to_vec_pretty(entry)
            .map_err(|e| JournalError::Encoding(e.to_string()))?;
        let path = self.path(entry.job_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|e| JournalError::Io(e.to_string()))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| JournalError::Io(e.to_string()))
    }

    async fn entries(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(JournalError::Io(e.to_string())),
        };

        let mut entries = Vec::new();
        while let Some(file) = dir
            .next_entry()
            .await
            .map_err(|e| JournalError::Io(e.to_string()))?
        {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read(&path)
                .await
                .map_err(|e| JournalError::Io(e.to_string()))?;
            match serde_json::from_slice::<JournalEntry>(&content) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable journal entry"),
            }
        }
        Ok(entries)
    }

    async fn forget(&self, job_id: JobId) -> Result<(), JournalError> {
        match fs::remove_file(self.path(job_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(JournalError::Io(e.to_string())),
        }
    }
}
