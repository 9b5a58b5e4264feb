//! WebSocket handler for Axum
//!
//! Handles relay connections and event routing. Storefront visitors connect
//! anonymously; the admin dashboard passes its Firebase ID token as the
//! `token` query parameter so the connection receives ticket announcements.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{
    connection::Connection,
    events::{ClientEvent, ServerEvent},
    state::RelayState,
};
use crate::auth::{authenticate_token, AuthState};

#[derive(Debug, Default, Deserialize)]
pub struct RelayParams {
    pub token: Option<String>,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
///
/// A token that is present but invalid is rejected before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<RelayParams>,
    State(relay): State<RelayState>,
    State(auth): State<AuthState>,
) -> Response {
    let is_admin = match params.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => match authenticate_token(&auth, token).await {
            Ok(user) => user.is_admin,
            Err(e) => return e.into_response(),
        },
        None => false,
    };

    ws.on_upgrade(move |socket| handle_socket(socket, relay, is_admin))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, relay: RelayState, is_admin: bool) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn = if is_admin {
        Connection::admin(tx)
    } else {
        Connection::new(tx)
    };
    let session_id = conn.session_id;
    let _ = conn.send(ServerEvent::Connected { session_id });
    let conn = relay.join(conn).await;

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize relay event");
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        match msg {
            Message::Text(text) => handle_frame(&text, &conn, &relay).await,
            Message::Close(_) => {
                tracing::info!(session_id = %session_id, "WebSocket close frame received");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Axum handles ping/pong automatically
            }
            Message::Binary(_) => {
                let _ = conn.send(ServerEvent::Error {
                    message: "Binary frames are not supported".to_string(),
                });
            }
        }
    }

    tracing::info!(session_id = %session_id, "WebSocket connection closing");
    relay.remove_connection(&session_id).await;
    send_task.abort();
}

/// Parse one text frame and dispatch it
pub(crate) async fn handle_frame(text: &str, conn: &Arc<Connection>, relay: &RelayState) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => handle_client_event(event, conn, relay).await,
        Err(e) => {
            tracing::warn!(
                error = ?e,
                session_id = %conn.session_id,
                "Failed to parse client event"
            );
            let _ = conn.send(ServerEvent::Error {
                message: "Invalid event format".to_string(),
            });
        }
    }
}

/// Handle client event
async fn handle_client_event(event: ClientEvent, conn: &Arc<Connection>, relay: &RelayState) {
    match event {
        ClientEvent::ClientMessage { text } => {
            relay.relay_client_message(conn, text).await;
        }
        ClientEvent::AdminMessage { text, timestamp } => {
            relay.relay_admin_message(conn, text, timestamp).await;
        }
        ClientEvent::Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}
