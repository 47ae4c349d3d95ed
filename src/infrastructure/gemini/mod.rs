//! Gemini API adapters

mod client;
mod extractor;
mod transcriber;

pub use client::{GeminiClient, API_BASE_URL};
pub use extractor::GeminiExtractor;
pub use transcriber::GeminiTranscriber;
