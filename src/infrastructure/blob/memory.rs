//! In-memory blob store adapter

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::ports::{BlobError, BlobStore};
use crate::domain::job::BlobHandle;

/// Blob store keeping bytes in process memory.
/// Counts stores and deletions so callers can observe the deletion guarantee.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<BlobHandle, Bytes>>,
    stored: AtomicUsize,
    deleted: AtomicUsize,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls
    pub fn stored_count(&self) -> usize {
        self.stored.load(Ordering::SeqCst)
    }

    /// Number of blobs actually removed, by consumption or forced deletion
    pub fn deleted_count(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }

    /// Number of blobs currently held
    pub fn len(&self) -> usize {
        self.with_blobs(|blobs| blobs.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, handle: &BlobHandle) -> bool {
        self.with_blobs(|blobs| blobs.contains_key(handle))
    }

    fn with_blobs<T>(&self, f: impl FnOnce(&mut HashMap<BlobHandle, Bytes>) -> T) -> T {
        match self.blobs.lock() {
            Ok(mut blobs) => f(&mut blobs),
            Err(e) => {
                tracing::error!("Mutex poisoned locking blob map: {e}");
                f(&mut e.into_inner())
            }
        }
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, handle: &BlobHandle, data: Bytes) -> Result<(), BlobError> {
        self.with_blobs(|blobs| blobs.insert(handle.clone(), data));
        self.stored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn consume_and_delete(&self, handle: &BlobHandle) -> Result<Bytes, BlobError> {
        let data = self
            .with_blobs(|blobs| blobs.remove(handle))
            .ok_or_else(|| BlobError::NotFound(handle.clone()))?;
        self.deleted.fetch_add(1, Ordering::SeqCst);
        Ok(data)
    }

    async fn force_delete(&self, handle: &BlobHandle) -> Result<bool, BlobError> {
        let removed = self.with_blobs(|blobs| blobs.remove(handle)).is_some();
        if removed {
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<BlobHandle>, BlobError> {
        Ok(self.with_blobs(|blobs| blobs.keys().cloned().collect()))
    }
}
