//! WebSocket channel for lightweight interactive lookups.
//!
//! Text frames are commands: `ping`, `info:<url>`, anything else is echoed.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::{Value, json};
use streamgate_core::{QualityTier, ResolutionRequest, SourceId};
use tracing::{debug, error, info};

use crate::server::AppState;

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handle_socket(socket, state).await {
            error!("WebSocket error: {e}");
        }
    })
}

async fn handle_socket(mut socket: WebSocket, state: AppState) -> Result<(), axum::Error> {
    info!("WebSocket connected");
    while let Some(message) = socket.recv().await {
        match message? {
            Message::Text(text) => {
                let reply = respond(&state, text.as_str()).await;
                socket.send(Message::Text(reply.to_string().into())).await?;
            }
            Message::Close(_) => break,
            other => debug!(?other, "Ignoring non-text frame"),
        }
    }
    info!("WebSocket disconnected");
    Ok(())
}

/// Builds the reply for one text command.
pub async fn respond(state: &AppState, text: &str) -> Value {
    if text == "ping" {
        return json!({ "type": "pong", "timestamp": Utc::now().to_rfc3339() });
    }

    if let Some(url) = text.strip_prefix("info:") {
        let Ok(source_id) = SourceId::from_url(url) else {
            return json!({ "error": "Invalid URL" });
        };
        let request = ResolutionRequest::video(source_id, QualityTier::default());
        return match state.service.resolve_stream(&request).await {
            Ok(stream) => json!({ "type": "info", "data": stream }),
            Err(e) => json!({ "type": "error", "error": e.user_message() }),
        };
    }

    json!({ "type": "message", "text": format!("Received: {text}") })
}
