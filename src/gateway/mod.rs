//! HTTP/WebSocket gateway.
//!
//! Routes:
//! - `GET /`                      liveness probe
//! - `POST /chat`                 request/response exchange, logged to the chat log
//! - `GET /ws/chat/{session_id}`  one WebSocket connection per session, history dropped on close

pub mod chat;
pub mod ws;

use crate::chatlog::{create_conversation_log, ConversationLog};
use crate::config::Config;
use crate::conversation::Conversation;
use crate::providers::{create_provider, Provider};
use crate::sessions::{create_session_store, SessionStore};
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Maximum request body size (16MB). Chat input has no limit of its own.
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Shared state for all gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub conversation: Arc<Conversation>,
    pub chat_log: Option<Arc<dyn ConversationLog>>,
}

impl AppState {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        provider: Arc<dyn Provider>,
        chat_log: Option<Arc<dyn ConversationLog>>,
    ) -> Self {
        Self {
            conversation: Arc::new(Conversation::new(sessions.clone(), provider)),
            sessions,
            chat_log,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let provider =
            create_provider(&config.inference).context("Failed to create inference provider")?;
        Ok(Self::new(
            create_session_store(),
            provider,
            create_conversation_log(&config.chat_log),
        ))
    }
}

/// Build the gateway router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(chat::handle_root))
        .route("/chat", post(chat::handle_chat))
        .route("/ws/chat/{session_id}", get(ws::handle_ws_chat))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn run_gateway(host: &str, port: u16, config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    tracing::debug!(
        sessions = state.sessions.name(),
        provider = state.conversation.provider().name(),
        chat_log = state.chat_log.as_ref().map_or("disabled", |log| log.name()),
        "Gateway components ready"
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind gateway to {host}:{port}"))?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        addr = %local_addr,
        backend = %config.inference.base_url,
        model = %config.inference.model,
        "Gateway listening"
    );
    if config.chat_log.enabled {
        tracing::info!(path = %config.chat_log.resolved_path().display(), "Chat log enabled");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
