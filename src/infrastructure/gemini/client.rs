//! Gemini generateContent client shared by the transcriber and the extractor

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::application::ports::CapabilityError;
use crate::domain::job::parse_timestamp;

/// Gemini API base URL
pub const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// Request types for Gemini API

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Option<SystemInstruction>,
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
pub(super) struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

impl SystemInstruction {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            parts: vec![TextPart { text: text.into() }],
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct TextPart {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerationConfig {
    /// Ask for a JSON document with deterministic sampling
    pub fn json() -> Self {
        Self {
            response_mime_type: Some("application/json".to_string()),
            temperature: Some(0.0),
        }
    }
}

// Response types for Gemini API

#[derive(Debug, Deserialize)]
pub(super) struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CandidateContent {
    pub parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiError {
    pub message: String,
}

/// Thin HTTP client for the generateContent endpoint
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: API_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at another endpoint, e.g. a local mock server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the API URL
    pub(super) fn api_url(&self, model: &str) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    /// Send a request and return the concatenated text of the first candidate.
    /// Aborts with `Cancelled` as soon as `cancel` fires.
    pub(super) async fn generate(
        &self,
        model: &str,
        body: &GenerateContentRequest,
        cancel: &CancellationToken,
    ) -> Result<String, CapabilityError> {
        tokio::select! {
            result = self.send(model, body) => result,
            _ = cancel.cancelled() => Err(CapabilityError::Cancelled),
        }
    }

    async fn send(&self, model: &str, body: &GenerateContentRequest) -> Result<String, CapabilityError> {
        let response = self
            .client
            .post(self.api_url(model))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CapabilityError::Timeout
                } else {
                    CapabilityError::Unavailable(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();

        // Handle HTTP errors
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CapabilityError::Unavailable("invalid API key".to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CapabilityError::Unavailable("rate limit exceeded".to_string()));
        }

        if status == reqwest::StatusCode::REQUEST_TIMEOUT || status == reqwest::StatusCode::GATEWAY_TIMEOUT {
            return Err(CapabilityError::Timeout);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CapabilityError::Unavailable(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::BadOutput(format!("unparseable response: {}", e)))?;

        // Check for API error in response body
        if let Some(error) = response.error {
            return Err(CapabilityError::Unavailable(error.message));
        }

        let text = extract_text(&response)
            .ok_or_else(|| CapabilityError::BadOutput("empty response".to_string()))?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CapabilityError::BadOutput("empty response".to_string()));
        }
        Ok(trimmed.to_string())
    }
}

/// Extract text from response
pub(super) fn extract_text(response: &GenerateContentResponse) -> Option<String> {
    let parts: Vec<&str> = response
        .candidates
        .as_ref()?
        .first()?
        .content
        .as_ref()?
        .parts
        .as_ref()?
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(""))
    }
}

/// Strip a Markdown code fence the model sometimes wraps JSON in
pub(super) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Timestamps arrive as numbers or as strings such as "12.5" or "01:02"
pub(super) fn timestamp_from_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
        serde_json::Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}
