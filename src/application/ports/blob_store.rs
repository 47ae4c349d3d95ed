//! Blob store port

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::job::BlobHandle;

/// Blob store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(BlobHandle),

    #[error("Blob storage I/O failed: {0}")]
    Io(String),
}

/// Port for the scoped temporary holder of uploaded media.
///
/// The store is content-opaque and supports no partial reads. Handles are
/// allocated by the caller so that an interrupted write can still be deleted.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh handle
    async fn put(&self, handle: &BlobHandle, data: Bytes) -> Result<(), BlobError>;

    /// Read the bytes and delete them in one step. A second call for the same
    /// handle fails with `NotFound`.
    async fn consume_and_delete(&self, handle: &BlobHandle) -> Result<Bytes, BlobError>;

    /// Delete the bytes if present. Idempotent.
    ///
    /// # Returns
    /// Whether anything was removed
    async fn force_delete(&self, handle: &BlobHandle) -> Result<bool, BlobError>;

    /// Handles currently held, used by the orphan sweep
    async fn list(&self) -> Result<Vec<BlobHandle>, BlobError>;
}
