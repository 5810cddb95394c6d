//! Google Gemini API client for facial emotion classification.
//!
//! Thin wrapper around the Gemini generateContent endpoint. Sends one JPEG
//! frame with a fixed prompt and parses the (emotion, confidence) pair out
//! of the model's reply, which is not always clean JSON.

use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::emotion::ALLOWED_EMOTIONS;
use crate::smoother::{Observation, DEFAULT_CONFIDENCE};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const CLASSIFY_PROMPT: &str = "Analyze this facial image and determine the primary emotion \
displayed. Return ONLY ONE of: 'happy', 'sad', 'angry', 'surprised', 'neutral', 'fearful', \
or 'disgusted'. Format your response as JSON with fields 'emotion' and 'confidence' \
(from 1-10). Example response: {\"emotion\": \"happy\", \"confidence\": 8}";

/// Errors that can occur while classifying a frame
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Gemini API key is required")]
    MissingApiKey,

    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("Invalid API key header")]
    InvalidApiKey,

    #[error("Gemini API request failed: {0}")]
    Request(String),

    #[error("Gemini API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse Gemini response: {0}")]
    Parse(String),

    #[error("Gemini response contained no usable emotion")]
    NoEmotion,
}

pub struct GeminiClassifier {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

// -- Response types --

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

/// Shape of the JSON object the prompt asks the model to produce.
#[derive(Debug, Deserialize)]
struct EmotionJson {
    emotion: Option<String>,
    confidence: Option<f64>,
}

impl GeminiClassifier {
    pub fn new(api_key: &str, model: Option<&str>) -> Result<Self, ClassifierError> {
        if api_key.trim().is_empty() {
            return Err(ClassifierError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        })
    }

    pub fn build_request_body(jpeg_base64: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "parts": [
                    {"text": CLASSIFY_PROMPT},
                    {"inline_data": {
                        "mime_type": "image/jpeg",
                        "data": jpeg_base64
                    }}
                ]
            }]
        })
    }

    /// Classify one JPEG frame (already base64-encoded).
    pub async fn classify(&self, jpeg_base64: &str) -> Result<Observation, ClassifierError> {
        let url = format!("{}/{}:generateContent", GEMINI_ENDPOINT, self.model);
        let body = Self::build_request_body(jpeg_base64);

        debug!("Gemini classify: payload={} chars", jpeg_base64.len());

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(
                "x-goog-api-key",
                HeaderValue::from_str(&self.api_key)
                    .map_err(|_| ClassifierError::InvalidApiKey)?,
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Truncate error body to avoid leaking sensitive data
            let truncated = if error_body.len() > 200 {
                error_body[..200].to_string()
            } else {
                error_body
            };
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                body: truncated,
            });
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Parse(e.to_string()))?;

        let text = Self::extract_text(&gemini_response).ok_or(ClassifierError::NoEmotion)?;
        debug!("Gemini reply: {:?}", text);

        Self::parse_reply(&text).ok_or(ClassifierError::NoEmotion)
    }

    /// Pull the first text part out of the first candidate.
    pub fn extract_text(response: &GeminiResponse) -> Option<String> {
        response
            .candidates
            .first()
            .and_then(|c| c.content.parts.iter().find_map(|p| p.text.clone()))
    }

    /// Parse the model's reply into a raw observation.
    ///
    /// First try the JSON object the prompt asks for; if the reply carries
    /// no parseable JSON, fall back to scanning the text for any known
    /// emotion keyword at the default confidence.
    pub fn parse_reply(text: &str) -> Option<Observation> {
        if let Some(json_str) = extract_json_object(text) {
            if let Ok(parsed) = serde_json::from_str::<EmotionJson>(&json_str) {
                let label = parsed.emotion.unwrap_or_else(|| "neutral".to_string());
                let confidence = parsed.confidence.unwrap_or(DEFAULT_CONFIDENCE);
                return Some(Observation::new(label, confidence));
            }
            warn!("Gemini reply had JSON that did not parse: {:?}", json_str);
        }

        // Fallback: keyword scan over the raw text.
        let lowered = text.to_lowercase();
        for label in ALLOWED_EMOTIONS {
            if lowered.contains(label) {
                return Some(Observation::new(label, DEFAULT_CONFIDENCE));
            }
        }

        None
    }
}

/// Locate a JSON object inside a possibly fenced or chatty reply.
fn extract_json_object(text: &str) -> Option<String> {
    // Remove markdown code block markers
    let cleaned = text.replace("```json", "").replace("```", "");

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    Some(cleaned[start..=end].to_string())
}
