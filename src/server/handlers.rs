use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::server::RelayState;

pub const MISSING_PROMPT: &str = "Mrow? You forgot to tell me the task! I can’t read minds... yet.";
pub const NOT_CONFIGURED: &str = "The humans behind the scenes messed something up. Classic.";
pub const GENERATION_FAILED: &str =
    "I pawed at it, chewed it, and stared into the void... nothing came out.";

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// `{"generatedText": ..}` on success, `{"error": ..}` otherwise
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerateReply {
    fn text(text: String) -> Self {
        GenerateReply {
            generated_text: Some(text),
            error: None,
        }
    }

    fn error(message: &str) -> Self {
        GenerateReply {
            generated_text: None,
            error: Some(message.to_string()),
        }
    }
}

type Reply = (StatusCode, Json<GenerateReply>);

fn fail(status: StatusCode, message: &str) -> Reply {
    (status, Json(GenerateReply::error(message)))
}

/// Forward one prompt to the provider. No retries, no prompt rewriting.
pub async fn generate(
    State(state): State<Arc<RelayState>>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Reply {
    let prompt = match body {
        Ok(Json(GenerateRequest { prompt: Some(p) })) if !p.is_empty() => p,
        Ok(_) => return fail(StatusCode::BAD_REQUEST, MISSING_PROMPT),
        Err(rejection) => {
            debug!(error = %rejection, "rejected generate body");
            return fail(StatusCode::BAD_REQUEST, MISSING_PROMPT);
        }
    };

    let Some(upstream) = state.upstream.as_ref() else {
        error!("GEMINI_API_KEY is not set; cannot generate");
        return fail(StatusCode::INTERNAL_SERVER_ERROR, NOT_CONFIGURED);
    };

    match upstream.generate(&prompt).await {
        Ok(text) => {
            info!(prompt_len = prompt.len(), text_len = text.len(), "generated");
            (StatusCode::OK, Json(GenerateReply::text(text)))
        }
        Err(e) => {
            error!(error = %e, "upstream generation failed");
            fail(StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED)
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}
