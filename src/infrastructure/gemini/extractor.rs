//! Gemini procedure extractor adapter

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::client::{
    strip_code_fence, timestamp_from_value, Content, GeminiClient, GenerateContentRequest,
    GenerationConfig, Part, SystemInstruction,
};
use crate::application::ports::{CapabilityError, Extractor};
use crate::domain::config::DEFAULT_MODEL;
use crate::domain::job::{Extraction, ProcedureStep, Transcript};

const EXTRACT_PROMPT: &str = r#"You write lab reports. The user message is a timestamped transcript of someone performing a procedure at the bench, one utterance per line as `text [start-end]`.
Rewrite it as the clean, concise list of steps that would appear in the methods section of a lab report.
Leave out chatter that is not part of the procedure. A single utterance may produce several steps.
Respond with JSON only, in the form
{"summary": "<one paragraph>", "procedure": [{"step": "...", "start_time": <seconds>, "end_time": <seconds>}]}
keeping the steps in the order they were performed."#;

#[derive(Debug, Deserialize)]
struct ExtractionBody {
    #[serde(default, alias = "Summary")]
    summary: Option<String>,
    #[serde(default, alias = "Procedure", alias = "steps")]
    procedure: Vec<StepBody>,
}

#[derive(Debug, Deserialize)]
struct StepBody {
    #[serde(alias = "text")]
    step: String,
    #[serde(default)]
    start_time: serde_json::Value,
    #[serde(default)]
    end_time: serde_json::Value,
}

/// Gemini API extractor. The transcript is rendered as timestamped lines.
pub struct GeminiExtractor {
    client: GeminiClient,
    model: String,
}

impl GeminiExtractor {
    pub fn new(client: GeminiClient) -> Self {
        Self::with_model(client, DEFAULT_MODEL)
    }

    pub fn with_model(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn build_request(transcript: &Transcript) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::text(transcript.render())],
            }],
            system_instruction: Some(SystemInstruction::new(EXTRACT_PROMPT)),
            generation_config: Some(GenerationConfig::json()),
        }
    }

    fn parse_extraction(text: &str) -> Result<Extraction, CapabilityError> {
        let body: ExtractionBody = serde_json::from_str(strip_code_fence(text))
            .map_err(|e| CapabilityError::BadOutput(format!("procedure is not valid JSON: {}", e)))?;

        Ok(Extraction {
            summary: body.summary,
            steps: body
                .procedure
                .into_iter()
                .map(|s| {
                    ProcedureStep::new(s.step).with_times(
                        timestamp_from_value(&s.start_time),
                        timestamp_from_value(&s.end_time),
                    )
                })
                .collect(),
        })
    }
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(
        &self,
        transcript: &Transcript,
        cancel: CancellationToken,
    ) -> Result<Extraction, CapabilityError> {
        tracing::debug!(model = %self.model, segments = transcript.segments().len(), "Requesting extraction");
        let body = Self::build_request(transcript);
        let text = self.client.generate(&self.model, &body, &cancel).await?;
        Self::parse_extraction(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::TranscriptSegment;

    #[test]
    fn request_carries_rendered_transcript() {
        let transcript = Transcript::new(vec![TranscriptSegment::timed("Add water", 0.0, 2.0)]);
        let request = GeminiExtractor::build_request(&transcript);
        assert_eq!(
            request.contents[0].parts[0].text.as_deref(),
            Some("Add water [0-2]\n")
        );
    }

    #[test]
    fn parse_lowercase_fields() {
        let text = r#"{"summary": "Plasmid prep", "procedure": [
            {"step": "Pellet cells", "start_time": 0, "end_time": 30},
            {"step": "Resuspend in P1", "start_time": "0:30", "end_time": null}
        ]}"#;
        let extraction = GeminiExtractor::parse_extraction(text).unwrap();
        assert_eq!(extraction.summary.as_deref(), Some("Plasmid prep"));
        assert_eq!(extraction.steps.len(), 2);
        assert_eq!(extraction.steps[1].start_time, Some(30.0));
        assert_eq!(extraction.steps[1].end_time, None);
    }

    #[test]
    fn parse_capitalized_fields_in_code_fence() {
        let text = "```json\n{\"Summary\": \"s\", \"Procedure\": [{\"step\": \"Mix\"}]}\n```";
        let extraction = GeminiExtractor::parse_extraction(text).unwrap();
        assert_eq!(extraction.steps[0].text, "Mix");
    }

    #[test]
    fn parse_rejects_prose() {
        let err = GeminiExtractor::parse_extraction("Step one: mix").unwrap_err();
        assert!(matches!(err, CapabilityError::BadOutput(_)));
    }
}
