//! Media domain module

mod media_payload;

pub use media_payload::{MediaFormat, MediaKind, MediaPayload};
