//! Gemini transcriber adapter

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::client::{
    strip_code_fence, timestamp_from_value, Content, GeminiClient, GenerateContentRequest,
    GenerationConfig, InlineData, Part, SystemInstruction,
};
use crate::application::ports::{CapabilityError, ProgressCallback, Transcriber};
use crate::domain::config::DEFAULT_MODEL;
use crate::domain::job::{Transcript, TranscriptSegment};
use crate::domain::media::MediaPayload;

const TRANSCRIBE_PROMPT: &str = r#"You transcribe recordings made at a laboratory bench.
Transcribe everything that is said, verbatim, in the language it is spoken.
Split the transcript into segments of one sentence or utterance each.
Respond with JSON only, in the form
{"segments": [{"text": "...", "start": <seconds>, "end": <seconds>}]}
where start and end are offsets from the beginning of the recording in seconds."#;

#[derive(Debug, Deserialize)]
struct TranscriptBody {
    segments: Vec<SegmentBody>,
}

#[derive(Debug, Deserialize)]
struct SegmentBody {
    text: String,
    #[serde(default)]
    start: serde_json::Value,
    #[serde(default)]
    end: serde_json::Value,
}

/// Gemini API transcriber. Media is sent inline, base64 encoded.
pub struct GeminiTranscriber {
    client: GeminiClient,
    model: String,
}

impl GeminiTranscriber {
    pub fn new(client: GeminiClient) -> Self {
        Self::with_model(client, DEFAULT_MODEL)
    }

    pub fn with_model(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Build the request body
    fn build_request(media: &MediaPayload) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: media.format().to_string(),
                        data: media.to_base64(),
                    }),
                }],
            }],
            system_instruction: Some(SystemInstruction::new(TRANSCRIBE_PROMPT)),
            generation_config: Some(GenerationConfig::json()),
        }
    }

    /// Parse the model's answer. Text that is not the requested JSON is kept
    /// as a single untimed segment.
    fn parse_transcript(text: &str) -> Transcript {
        match serde_json::from_str::<TranscriptBody>(strip_code_fence(text)) {
            Ok(body) => Transcript::new(
                body.segments
                    .into_iter()
                    .map(|s| TranscriptSegment {
                        text: s.text.trim().to_string(),
                        start: timestamp_from_value(&s.start),
                        end: timestamp_from_value(&s.end),
                    })
                    .collect(),
            ),
            Err(e) => {
                tracing::debug!(error = %e, "Transcript is not segmented JSON, keeping raw text");
                Transcript::from_text(text.trim())
            }
        }
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn transcribe(
        &self,
        media: &MediaPayload,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<Transcript, CapabilityError> {
        tracing::debug!(model = %self.model, size = %media.human_readable_size(), "Requesting transcription");
        let body = Self::build_request(media);
        let text = self.client.generate(&self.model, &body, &cancel).await?;

        if let Some(on_progress) = on_progress {
            on_progress(1.0);
        }
        Ok(Self::parse_transcript(&text))
    }
}
