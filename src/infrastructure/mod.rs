//! Infrastructure layer - Adapter implementations
//!
//! Concrete implementations of the port interfaces: blob storage and the
//! job journal on disk or in memory, the Gemini transcription and extraction
//! backends, scripted backends for offline runs, and the XDG config file.

pub mod blob;
pub mod config;
pub mod gemini;
pub mod journal;
pub mod scripted;

pub use blob::{FsBlobStore, InMemoryBlobStore};
pub use config::XdgConfigStore;
pub use gemini::{GeminiClient, GeminiExtractor, GeminiTranscriber};
pub use journal::{FsJournal, InMemoryJournal};
pub use scripted::{ScriptedExtractor, ScriptedTranscriber};
