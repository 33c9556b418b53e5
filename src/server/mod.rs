//! Relay between the CLI and the text-generation provider. Holds the
//! provider key so clients never see it.

pub mod gemini;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::model::config::ServerConfig;
use crate::server::gemini::{GeminiClient, Upstream};

/// Environment variable holding the provider key
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Error type for running the relay
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid bind address '{addr}': {source}")]
    Addr {
        addr: String,
        source: std::net::AddrParseError,
    },
    #[error("could not bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: std::io::Error },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared, read-only relay state
pub struct RelayState {
    /// `None` when no provider key is configured; requests then fail with 500
    pub upstream: Option<Arc<dyn Upstream>>,
}

impl RelayState {
    pub fn new(upstream: Option<Arc<dyn Upstream>>) -> Self {
        RelayState { upstream }
    }

    /// Gemini upstream when a key is present
    pub fn from_config(config: &ServerConfig, api_key: Option<String>) -> Self {
        let upstream = api_key
            .filter(|k| !k.trim().is_empty())
            .map(|key| Arc::new(GeminiClient::new(config, key)) as Arc<dyn Upstream>);
        RelayState { upstream }
    }
}

pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/api/generate", post(handlers::generate))
        .route("/api/gemini", post(handlers::generate))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Bind and serve until Ctrl+C
pub async fn serve(config: &ServerConfig, api_key: Option<String>) -> Result<(), ServerError> {
    let addr: SocketAddr = config.bind.parse().map_err(|e| ServerError::Addr {
        addr: config.bind.clone(),
        source: e,
    })?;
    let state = Arc::new(RelayState::from_config(config, api_key));
    if state.upstream.is_none() {
        warn!("{} is not set; generation requests will fail", API_KEY_VAR);
    }

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind { addr, source: e })?;
    info!(%addr, model = %config.model, "relay listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
