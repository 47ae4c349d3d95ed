//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod blob_store;
pub mod capability;
pub mod config;
pub mod journal;

// Re-export common types
pub use blob_store::{BlobError, BlobStore};
pub use capability::{CapabilityError, Extractor, ProgressCallback, Transcriber};
pub use config::ConfigStore;
pub use journal::{JobJournal, JournalEntry, JournalError};
