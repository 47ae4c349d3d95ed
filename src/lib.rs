//! LabScribe - turn lab recordings into structured procedures
//!
//! A client uploads an audio or video recording of a bench procedure. The
//! service stores it briefly, has Google Gemini transcribe it, deletes the
//! media, extracts an ordered list of steps from the transcript and reports
//! progress throughout.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Job state machine, value objects, and errors
//! - **Application**: Job manager, progress channel, and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (blob store, journal, Gemini, config)
//! - **API**: HTTP routes over the job manager
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod api;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
