//! Deterministic capability adapters
//!
//! Used by tests and by `serve --fake-backend` to run the whole engine
//! without network access.

mod extractor;
mod transcriber;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::ports::CapabilityError;

pub use extractor::{ExtractorScript, ScriptedExtractor};
pub use transcriber::{ScriptedTranscriber, TranscriberScript};

/// Sleep for `delay`, giving up early when cancelled unless cancellation is ignored
async fn pause(delay: Duration, cancel: &CancellationToken, ignore_cancel: bool) -> Result<(), CapabilityError> {
    if ignore_cancel {
        tokio::time::sleep(delay).await;
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel.cancelled() => Err(CapabilityError::Cancelled),
    }
}

/// Block until cancelled, or forever when cancellation is ignored
async fn hang(cancel: &CancellationToken, ignore_cancel: bool) -> CapabilityError {
    if ignore_cancel {
        std::future::pending::<()>().await;
    }
    cancel.cancelled().await;
    CapabilityError::Cancelled
}
