//! Generative-AI collaborator.
//!
//! Services talk to [`ContentGenerator`]; the process owns one
//! [`GeminiClient`](gemini::GeminiClient) and hands it around through the
//! server state.

pub mod gemini;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("No AI provider credential is configured")]
    MissingApiKey,
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI provider answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("AI provider returned no text (finish reason: {0:?})")]
    EmptyResponse(Option<String>),
    #[error("AI response did not match the requested schema: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ContentRole {
    User,
    Model,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Part {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Content {
    pub role: ContentRole,
    pub parts: Vec<Part>,
}

impl Content {
    #[must_use]
    pub fn text(role: ContentRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(text.into())],
        }
    }
}

/// A single generation call.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct GenerationRequest {
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub temperature: Option<f32>,
    /// When set, the provider is asked for JSON matching this schema instead of free text.
    pub response_schema: Option<serde_json::Value>,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Returns the generated text, which is a JSON document when a response schema was given.
    async fn generate(&self, request: GenerationRequest) -> Result<String, AiError>;
}
