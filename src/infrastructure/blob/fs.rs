//! Filesystem blob store adapter

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use crate::application::ports::{BlobError, BlobStore};
use crate::domain::job::BlobHandle;

const BLOB_EXT: &str = "blob";
const PARTIAL_EXT: &str = "blob.part";
const CONSUMING_EXT: &str = "blob.consuming";

/// Blob store keeping each upload as `<dir>/<handle>.blob`.
///
/// Writes go to a `.part` file first and are renamed into place. Consumption
/// renames the blob away before reading it, so the handle is invalid from
/// the first step on.
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, handle: &BlobHandle, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", handle, ext))
    }

    async fn remove_if_present(path: &Path) -> Result<bool, BlobError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BlobError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    fn handle_from_file_name(name: &str) -> Option<BlobHandle> {
        [CONSUMING_EXT, PARTIAL_EXT, BLOB_EXT]
            .iter()
            .find_map(|ext| name.strip_suffix(&format!(".{}", ext)))
            .and_then(BlobHandle::parse)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, handle: &BlobHandle, data: Bytes) -> Result<(), BlobError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))?;

        let partial = self.path(handle, PARTIAL_EXT);
        fs::write(&partial, &data)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))?;
        fs::rename(&partial, self.path(handle, BLOB_EXT))
            .await
            .map_err(|e| BlobError::Io(e.to_string()))
    }

    async fn consume_and_delete(&self, handle: &BlobHandle) -> Result<Bytes, BlobError> {
        let consuming = self.path(handle, CONSUMING_EXT);
        match fs::rename(self.path(handle, BLOB_EXT), &consuming).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BlobError::NotFound(handle.clone()))
            }
            Err(e) => return Err(BlobError::Io(e.to_string())),
        }

        let read = fs::read(&consuming).await;
        Self::remove_if_present(&consuming).await?;
        read.map(Bytes::from)
            .map_err(|e| BlobError::Io(e.to_string()))
    }

    async fn force_delete(&self, handle: &BlobHandle) -> Result<bool, BlobError> {
        let mut removed = false;
        for ext in [BLOB_EXT, PARTIAL_EXT, CONSUMING_EXT] {
            removed |= Self::remove_if_present(&self.path(handle, ext)).await?;
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<BlobHandle>, BlobError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BlobError::Io(e.to_string())),
        };

        let mut handles = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BlobError::Io(e.to_string()))?
        {
            let name = entry.file_name();
            if let Some(handle) = name.to_str().and_then(Self::handle_from_file_name) {
                if !handles.contains(&handle) {
                    handles.push(handle);
                }
            }
        }
        Ok(handles)
    }
}
