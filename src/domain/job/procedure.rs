//! Structured procedure produced from a transcript

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notice attached to every generated procedure
pub const CONFIDENTIALITY_NOTICE: &str =
    "Generated from a private recording. The recording was deleted after transcription.";

/// A single step of the procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureStep {
    pub text: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl ProcedureStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start_time: None,
            end_time: None,
        }
    }

    pub fn with_times(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }
}

/// Ordered, immutable, non-empty list of steps
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StepList(Vec<ProcedureStep>);

impl StepList {
    /// Build a step list, dropping steps without text.
    /// Returns None when nothing remains.
    pub fn new(steps: Vec<ProcedureStep>) -> Option<Self> {
        let steps: Vec<ProcedureStep> = steps
            .into_iter()
            .filter_map(|mut step| {
                let trimmed = step.text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                step.text = trimmed.to_string();
                Some(step)
            })
            .collect();
        (!steps.is_empty()).then_some(Self(steps))
    }

    pub fn steps(&self) -> &[ProcedureStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.text.as_str())
    }
}

/// Unvalidated extractor output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub summary: Option<String>,
    pub steps: Vec<ProcedureStep>,
}

/// Generation metadata carried by every result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureMetadata {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub confidentiality: String,
}

impl ProcedureMetadata {
    pub fn now() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            confidentiality: CONFIDENTIALITY_NOTICE.to_string(),
        }
    }
}

/// Final result of a completed job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Procedure {
    pub summary: Option<String>,
    pub steps: StepList,
    pub metadata: ProcedureMetadata,
}

impl Procedure {
    /// Validate raw extractor output. Returns None when no usable step remains.
    pub fn from_extraction(extraction: Extraction) -> Option<Self> {
        let steps = StepList::new(extraction.steps)?;
        let summary = extraction
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Some(Self {
            summary,
            steps,
            metadata: ProcedureMetadata::now(),
        })
    }
}
