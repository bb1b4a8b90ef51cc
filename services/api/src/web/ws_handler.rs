//! services/api/src/web/ws_handler.rs
//!
//! The entry point and control loop for a realtime WebSocket connection.
//! A connection starts unauthenticated, binds itself to a user with an
//! `authenticate` message, and from then on receives that user's notifications.

use crate::realtime::{ConnectionId, Outbox};
use crate::web::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use invoice_core::domain::UserId;
use invoice_core::ports::PortError;
use invoice_core::realtime::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let connection_id: ConnectionId = Uuid::new_v4();
    info!(%connection_id, "New realtime connection established");

    let (mut ws_sender, mut receiver) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerMessage>();
    let shutdown = app_state.hub.shutdown_token();

    // --- 1. Writer: the only task that touches the sending half ---
    let writer = tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!(%connection_id, "Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                warn!(%connection_id, "Failed to write to socket, closing writer");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // --- 2. Main Message Loop ---
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(%connection_id, "Realtime hub stopped, closing connection");
                break;
            }
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_text_message(text.as_str(), connection_id, &app_state, &outbox).await;
                }
                Some(Ok(Message::Close(_))) => {
                    info!(%connection_id, "Client sent close message.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%connection_id, "WebSocket error: {}", e);
                    break;
                }
                None => {
                    info!(%connection_id, "Client disconnected.");
                    break;
                }
            }
        }
    }

    // --- 3. Cleanup ---
    // Once the hub and this loop drop their outbox handles, the writer drains and exits.
    app_state.hub.leave(connection_id);
    drop(outbox);
    if writer.await.is_err() {
        error!(%connection_id, "Socket writer task panicked");
    }
    info!(%connection_id, "Realtime connection closed.");
}

/// Handles one text frame from the client.
async fn handle_text_message(
    text: &str,
    connection_id: ConnectionId,
    app_state: &Arc<AppState>,
    outbox: &Outbox,
) {
    let result = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Authenticate { user_id }) => authenticate(user_id, app_state).await,
        Err(e) => {
            // Group membership is left as it was.
            warn!(%connection_id, "Failed to deserialize client message: {}", e);
            let _ = outbox.send(ServerMessage::AuthenticationError {
                message: "Invalid message".to_string(),
            });
            return;
        }
    };

    match result {
        Ok(user_id) => {
            // Queue the acknowledgement before joining so it precedes any push.
            let _ = outbox.send(ServerMessage::Authenticated {
                user_id,
                connection_id,
            });
            app_state.hub.join(connection_id, user_id, outbox.clone());
            info!(%connection_id, %user_id, "Realtime connection authenticated");
        }
        Err(message) => {
            app_state.hub.leave(connection_id);
            let _ = outbox.send(ServerMessage::AuthenticationError { message });
        }
    }
}

/// Resolves the user a connection claims to be. Errors carry the client-facing message.
async fn authenticate(user_id: Option<String>, app_state: &AppState) -> Result<UserId, String> {
    let raw = user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| "User ID is required".to_string())?;
    let user_id = Uuid::parse_str(&raw).map_err(|_| "User not found".to_string())?;

    match app_state.users.find_user_by_id(user_id).await {
        Ok(user) => Ok(user.id),
        Err(PortError::NotFound(_)) => Err("User not found".to_string()),
        Err(e) => {
            error!(%user_id, "Failed to look up user for realtime auth: {:?}", e);
            Err("Authentication failed".to_string())
        }
    }
}
