//! The relay router driven in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tower::ServiceExt;

use tim::server::gemini::{Upstream, UpstreamError};
use tim::server::handlers::{GENERATION_FAILED, GenerateReply, MISSING_PROMPT, NOT_CONFIGURED};
use tim::server::{RelayState, router};

struct FakeUpstream {
    ok: bool,
    seen: Mutex<Vec<String>>,
}

impl FakeUpstream {
    fn new(ok: bool) -> Arc<Self> {
        Arc::new(FakeUpstream {
            ok,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.seen.lock().push(prompt.to_string());
        if self.ok {
            Ok(format!("echo: {}", prompt))
        } else {
            Err(UpstreamError::EmptyResponse)
        }
    }
}

fn app(upstream: Option<Arc<FakeUpstream>>) -> axum::Router {
    let upstream = upstream.map(|u| u as Arc<dyn Upstream>);
    router(Arc::new(RelayState::new(upstream)))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, GenerateReply) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn forwards_prompt_verbatim() {
    let upstream = FakeUpstream::new(true);
    let (status, reply) = send(
        app(Some(Arc::clone(&upstream))),
        post("/api/generate", r#"{"prompt": "  split *this*  "}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply.generated_text.as_deref(), Some("echo:   split *this*  "));
    assert_eq!(reply.error, None);
    assert_eq!(upstream.seen.lock().as_slice(), ["  split *this*  "]);
}

#[tokio::test]
async fn legacy_path_is_an_alias() {
    let (status, reply) = send(app(Some(FakeUpstream::new(true))), post("/api/gemini", r#"{"prompt": "x"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply.generated_text.as_deref(), Some("echo: x"));
}

#[tokio::test]
async fn missing_or_empty_prompt_is_bad_request() {
    for body in [r#"{}"#, r#"{"prompt": ""}"#, r#"{"prompt": null}"#, "not json"] {
        let upstream = FakeUpstream::new(true);
        let (status, reply) = send(app(Some(Arc::clone(&upstream))), post("/api/generate", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(reply.error.as_deref(), Some(MISSING_PROMPT));
        assert!(upstream.seen.lock().is_empty());
    }
}

#[tokio::test]
async fn missing_key_is_server_error() {
    let (status, reply) = send(app(None), post("/api/generate", r#"{"prompt": "x"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.error.as_deref(), Some(NOT_CONFIGURED));
}

#[tokio::test]
async fn upstream_failure_is_server_error() {
    let (status, reply) = send(app(Some(FakeUpstream::new(false))), post("/api/generate", r#"{"prompt": "x"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.error.as_deref(), Some(GENERATION_FAILED));
    assert_eq!(reply.generated_text, None);
}

#[tokio::test]
async fn health_check() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app(None).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[test]
fn blank_key_means_not_configured() {
    let config = tim::model::config::ServerConfig::default();
    assert!(RelayState::from_config(&config, Some("  ".into())).upstream.is_none());
    assert!(RelayState::from_config(&config, None).upstream.is_none());
    assert!(RelayState::from_config(&config, Some("key".into())).upstream.is_some());
}
