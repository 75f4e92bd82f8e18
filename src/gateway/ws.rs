//! WebSocket chat surface.
//!
//! Connected → (await text → exchange → reply)* → closed. Every text frame gets
//! exactly one text frame back: the model reply or `Error: <detail>`. Failed
//! exchanges leave the history untouched and the connection open. The session's
//! history is created empty on connect and deleted on disconnect. Exchanges on
//! this surface are not written to the chat log.

use super::AppState;
use crate::conversation::ExchangeError;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};

/// GET /ws/chat/{session_id}: upgrade to a chat WebSocket
pub async fn handle_ws_chat(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, session_id, state))
}

async fn run_session(mut socket: WebSocket, session_id: String, state: AppState) {
    if let Err(e) = state.sessions.reset(&session_id).await {
        tracing::warn!(session_id = %session_id, error = %e, "Failed to open session");
        return;
    }
    tracing::info!(session_id = %session_id, "WebSocket session opened");

    while let Some(frame) = socket.recv().await {
        let user_input = match frame {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive failed");
                break;
            }
        };

        let outbound = match state
            .conversation
            .exchange(&session_id, &user_input, None)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "WebSocket exchange failed");
                error_message(&e)
            }
        };

        if socket.send(Message::Text(outbound.into())).await.is_err() {
            break;
        }
    }

    match state.sessions.delete(&session_id).await {
        Ok(_) => tracing::info!(session_id = %session_id, "WebSocket session closed"),
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to drop session history");
        }
    }
}

fn error_message(err: &ExchangeError) -> String {
    format!("Error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_embeds_backend_detail() {
        let err = ExchangeError::Inference(anyhow::anyhow!("connection refused"));
        assert_eq!(error_message(&err), "Error: connection refused");
    }
}
