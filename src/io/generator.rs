use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::http::join_url;

/// Shown when the relay fails without saying why
pub const GENERATION_FALLBACK: &str = "This one’s a tough nut to paw open. Maybe give it another go?";

/// Error type for text generation
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("could not reach the generator: {0}")]
    Transport(#[from] reqwest::Error),
    /// The relay answered with an error; the message is user-facing
    #[error("{0}")]
    Upstream(String),
    #[error("unexpected response from the generator: {0}")]
    Decode(String),
}

/// Free text in, generated text out. One call, no retry.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    generated_text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the relay started by `tim serve` (`POST /api/generate`)
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: Client,
    endpoint: String,
}

impl ProxyClient {
    /// No request timeout is configured; generation can take a while.
    pub fn new(proxy_url: &str) -> Self {
        ProxyClient {
            client: Client::new(),
            endpoint: join_url(proxy_url, "api/generate"),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TextGenerator for ProxyClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        debug!(endpoint = %self.endpoint, prompt_len = prompt.len(), "requesting generation");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { prompt })
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<GenerateResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|r| r.error)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERATION_FALLBACK.to_string());
            return Err(GenerateError::Upstream(message));
        }

        parsed
            .and_then(|r| r.generated_text)
            .ok_or_else(|| GenerateError::Decode("missing generatedText".into()))
    }
}
