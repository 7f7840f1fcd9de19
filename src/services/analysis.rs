use crate::config::AppConfig;
use crate::services::uploads::UploadRecord;
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header carrying the API credential. Keeps the key out of request URLs.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Instruction sent alongside every image.
pub const IDENTIFY_PROMPT: &str = "Identify the plant in this photo. Reply with its common name, \
scientific name and family, followed by a short description and basic care tips \
(light, water, soil). If the image does not show a plant, say so.";

// Fixed generation parameters
const TEMPERATURE: f32 = 0.4;
const TOP_K: u32 = 32;
const TOP_P: f32 = 1.0;
const MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("failed to read staged upload: {0}")]
    Read(#[from] std::io::Error),

    #[error("analysis request timed out")]
    Timeout,

    #[error("analysis request failed: {0}")]
    Request(reqwest::Error),

    #[error("analysis API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("analysis API returned an unreadable body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("analysis API returned no text")]
    EmptyResponse,
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AnalysisError::Timeout
        } else {
            // request URLs never reach the logs
            AnalysisError::Request(e.without_url())
        }
    }
}

/// The external model that turns a staged photo into a description.
#[async_trait::async_trait]
pub trait PlantAnalyzer: Send + Sync {
    async fn identify(&self, upload: &UploadRecord) -> Result<String, AnalysisError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Builds the JSON body for one `generateContent` call.
fn build_request<'a>(mime_type: &'a str, image: &[u8]) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: IDENTIFY_PROMPT,
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type,
                        data: general_purpose::STANDARD.encode(image),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            top_k: TOP_K,
            top_p: TOP_P,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        },
    }
}

/// Joins the text parts of the first candidate.
fn extract_text(body: &str) -> Result<String, AnalysisError> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    Ok(text.to_string())
}

/// Google Gemini `generateContent` client
pub struct GeminiAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiAnalyzer {
    pub fn new(config: &AppConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(config.analysis_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/models/{}:generateContent", config.api_base, config.model),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl PlantAnalyzer for GeminiAnalyzer {
    async fn identify(&self, upload: &UploadRecord) -> Result<String, AnalysisError> {
        let image = tokio::fs::read(&upload.path).await?;
        let payload = build_request(&upload.mime_type, &image);

        tracing::info!(file = %upload.file_name, "📤 Sending image to Gemini");

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let excerpt: String = body.chars().take(500).collect();
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                body: excerpt,
            });
        }

        let text = extract_text(&body)?;
        tracing::debug!(file = %upload.file_name, chars = text.len(), "Gemini answered");
        Ok(text)
    }
}
