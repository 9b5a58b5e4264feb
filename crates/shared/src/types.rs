//! Common types used across the support desk

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// Sender identifier recorded for messages sent from the admin dashboard
pub const ADMIN_SENDER: &str = "admin";

/// Maximum accepted chat message length (characters)
pub const MAX_MESSAGE_LENGTH: usize = 5_000;

// =============================================================================
// Chat Messages
// =============================================================================

/// A persisted chat message as delivered to relay clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    /// Session id of the sending connection, or [`ADMIN_SENDER`]
    pub sender: String,
    pub text: String,
    pub is_admin: bool,
    /// Client-facing timestamp (RFC 3339)
    pub timestamp: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A chat message that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub sender: String,
    pub text: String,
    pub is_admin: bool,
    pub timestamp: String,
}

impl NewChatMessage {
    /// Message typed by a storefront visitor on the given connection
    pub fn from_client(session_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            sender: session_id.to_string(),
            text: text.into(),
            is_admin: false,
            timestamp: now_rfc3339(),
        }
    }

    /// Message typed by support staff in the admin dashboard
    ///
    /// A missing or non-RFC 3339 timestamp is replaced with the current time.
    pub fn from_admin(text: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            sender: ADMIN_SENDER.to_string(),
            text: text.into(),
            is_admin: true,
            timestamp: timestamp
                .filter(|t| OffsetDateTime::parse(t, &Rfc3339).is_ok())
                .unwrap_or_else(now_rfc3339),
        }
    }

    /// Required-field validation applied before a message is stored
    pub fn validate(&self) -> Result<(), String> {
        if self.sender.trim().is_empty() {
            return Err("Sender is required".to_string());
        }
        if self.text.trim().is_empty() {
            return Err("Message text is required".to_string());
        }
        if self.text.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(format!(
                "Message too long (max {} characters)",
                MAX_MESSAGE_LENGTH
            ));
        }
        Ok(())
    }
}

/// Current UTC time formatted as RFC 3339
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

// =============================================================================
// Tickets
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(format!("Unknown ticket status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TicketPriority::Low),
            "medium" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            "urgent" => Ok(TicketPriority::Urgent),
            other => Err(format!("Unknown ticket priority: {}", other)),
        }
    }
}

/// Support ticket as returned by the API
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupportTicket {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub subject: String,
    pub message: String,
    pub bot_response: Option<String>,
    pub status: String,
    pub priority: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Users
// =============================================================================

/// Firebase identity mirrored into the database
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub firebase_uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_message_uses_admin_sender() {
        let msg = NewChatMessage::from_admin("Hello from support", None);
        assert_eq!(msg.sender, ADMIN_SENDER);
        assert!(msg.is_admin);
        assert!(!msg.timestamp.is_empty());
    }

    #[test]
    fn test_admin_message_keeps_supplied_timestamp() {
        let ts = "2024-05-01T10:00:00Z".to_string();
        let msg = NewChatMessage::from_admin("hi", Some(ts.clone()));
        assert_eq!(msg.timestamp, ts);
    }

    #[test]
    fn test_admin_message_replaces_unparseable_timestamp() {
        let msg = NewChatMessage::from_admin("hi", Some("yesterday at noon".to_string()));
        assert_ne!(msg.timestamp, "yesterday at noon");
        assert!(OffsetDateTime::parse(&msg.timestamp, &Rfc3339).is_ok());

        let msg = NewChatMessage::from_admin("hi", Some("  ".to_string()));
        assert!(OffsetDateTime::parse(&msg.timestamp, &Rfc3339).is_ok());
    }

    #[test]
    fn test_validation_rejects_blank_text() {
        let msg = NewChatMessage::from_client(Uuid::new_v4(), "   ");
        assert!(msg.validate().is_err());

        let msg = NewChatMessage::from_client(Uuid::new_v4(), "Where is my order?");
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_oversized_text() {
        let msg = NewChatMessage::from_client(Uuid::new_v4(), "a".repeat(MAX_MESSAGE_LENGTH + 1));
        assert!(msg.validate().is_err());
    }

    #[test]
    fn test_ticket_enums_parse() {
        assert_eq!("in_progress".parse::<TicketStatus>(), Ok(TicketStatus::InProgress));
        assert_eq!("urgent".parse::<TicketPriority>(), Ok(TicketPriority::Urgent));
        assert!("pending".parse::<TicketStatus>().is_err());
        assert_eq!(TicketPriority::default(), TicketPriority::Medium);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, r#""in_progress""#);
    }
}
