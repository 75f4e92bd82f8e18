//! Request/response handlers.

use super::AppState;
use crate::chatlog::LogRecord;
use crate::conversation::ExchangeError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub user_input: String,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub bot_response: String,
}

/// GET /: liveness probe
pub async fn handle_root() -> impl IntoResponse {
    Json(serde_json::json!({"message": "Chatbot is running!"}))
}

/// POST /chat: run one exchange and log it
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> impl IntoResponse {
    let reply = match state
        .conversation
        .exchange(&body.session_id, &body.user_input, body.user_name.as_deref())
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(session_id = %body.session_id, error = %e, "Chat exchange failed");
            let detail = match e {
                ExchangeError::Inference(e) => {
                    format!("Error connecting to inference backend: {e:#}")
                }
                other => other.to_string(),
            };
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"detail": detail})),
            )
                .into_response();
        }
    };

    if let Some(log) = &state.chat_log {
        let record = LogRecord::now(&body.session_id, &body.user_input, &reply);
        if let Err(e) = log.append(&record).await {
            tracing::warn!(session_id = %body.session_id, error = %e, "Failed to write chat log");
        }
    }

    Json(ChatResponse {
        bot_response: reply,
    })
    .into_response()
}
