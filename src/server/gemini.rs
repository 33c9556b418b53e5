use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::http::{error_message, join_url};
use crate::model::config::ServerConfig;

/// Error type for the upstream provider call
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("upstream returned no text")]
    EmptyResponse,
}

/// The text-generation provider behind the relay
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text parts of the first candidate, concatenated
    fn text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() { None } else { Some(text) }
    }
}

/// Provider errors nest the message: `{"error": {"message": ..}}`
fn provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Gemini `generateContent` over REST
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &ServerConfig, api_key: impl Into<String>) -> Self {
        GeminiClient {
            client: Client::new(),
            endpoint: join_url(
                &config.upstream_url,
                &format!("v1beta/models/{}:generateContent", config.model),
            ),
            api_key: api_key.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Upstream for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let body = GenerateContentRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };
        debug!(endpoint = %self.endpoint, "calling upstream");
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = provider_message(&text)
                .or_else(|| error_message(&text))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
            return Err(UpstreamError::Status { status, message });
        }

        serde_json::from_str::<GenerateContentResponse>(&text)
            .unwrap_or_default()
            .text()
            .ok_or(UpstreamError::EmptyResponse)
    }
}
