//! Google Gemini `generateContent` REST client.

use crate::ai::{AiError, Content, ContentGenerator, ContentRole, GenerationRequest, Part};
use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use tracing::debug;

const API_KEY_HEADER: &str = "x-goog-api-key";
const JSON_MIME_TYPE: &str = "application/json";

pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum WirePart {
    Text(String),
    InlineData(Blob),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(
        api_key: Option<String>,
        model: String,
        base_url: String,
    ) -> Result<Self, AiError> {
        let http = Client::builder().build()?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

impl Debug for GeminiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl From<Content> for WireContent {
    fn from(value: Content) -> Self {
        let role = match value.role {
            ContentRole::User => "user",
            ContentRole::Model => "model",
        };

        Self {
            role: Some(role),
            parts: value.parts.into_iter().map(WirePart::from).collect(),
        }
    }
}

impl From<Part> for WirePart {
    fn from(value: Part) -> Self {
        match value {
            Part::Text(text) => Self::Text(text),
            Part::Image { mime_type, data } => Self::InlineData(Blob {
                mime_type,
                data: BASE64_STANDARD.encode(data),
            }),
        }
    }
}

impl From<GenerationRequest> for GenerateContentRequest {
    fn from(value: GenerationRequest) -> Self {
        let system_instruction = value.system_instruction.map(|instruction| WireContent {
            role: None,
            parts: vec![WirePart::Text(instruction)],
        });

        let generation_config = GenerationConfig {
            temperature: value.temperature,
            response_mime_type: value.response_schema.as_ref().map(|_| JSON_MIME_TYPE),
            response_schema: value.response_schema,
        };

        Self {
            system_instruction,
            contents: value.contents.into_iter().map(WireContent::from).collect(),
            generation_config,
        }
    }
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, AiError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(AiError::EmptyResponse(None));
        };

        let text: String = candidate
            .content
            .into_iter()
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            Err(AiError::EmptyResponse(candidate.finish_reason))
        } else {
            Ok(text)
        }
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;
        let body = GenerateContentRequest::from(request);

        debug!(model = %self.model, contents = body.contents.len(), "Calling Gemini");

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }

        response.json::<GenerateContentResponse>().await?.into_text()
    }
}
