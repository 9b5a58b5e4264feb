//! Relay event types and serialization
//!
//! Frames are JSON objects tagged by `type`, using the event names the
//! storefront and admin dashboard already speak (`clientMessage`,
//! `adminMessage`, `chatHistory`).

use serde::{Deserialize, Serialize};
use supportdesk_shared::ChatMessage;
use uuid::Uuid;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Message typed by a storefront visitor
    ClientMessage { text: String },

    /// Message typed by support staff in the admin dashboard
    AdminMessage {
        text: String,
        #[serde(default)]
        timestamp: Option<String>,
    },

    /// Heartbeat ping to keep connection alive
    Ping,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Connection acknowledged
    Connected { session_id: Uuid },

    /// Most recent persisted messages, oldest first (sent once on connect)
    ChatHistory { messages: Vec<ChatMessage> },

    /// A persisted message, rebroadcast to every connection
    AdminMessage(ChatMessage),

    /// A support ticket was opened from a chat conversation
    TicketCreated {
        ticket_id: Uuid,
        subject: String,
        priority: String,
    },

    /// Heartbeat response
    Pong,

    /// Error message
    Error { message: String },
}
