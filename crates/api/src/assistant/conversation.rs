//! Conversation turns and transcript formatting

use serde::{Deserialize, Serialize};

/// Who wrote a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "bot", alias = "model")]
    Assistant,
}

/// One message in a chat-assistant conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Render turns as a `User:` / `Assistant:` transcript, skipping blank turns
pub fn format_history(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .filter(|turn| !turn.content.trim().is_empty())
        .map(|turn| {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{}: {}", speaker, turn.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The most recent non-blank user message
pub fn last_user_message(history: &[ConversationTurn]) -> Option<&str> {
    history
        .iter()
        .rev()
        .filter(|turn| turn.is_user())
        .map(|turn| turn.content.trim())
        .find(|content| !content.is_empty())
}

/// All non-blank user messages, oldest first
pub fn user_messages(history: &[ConversationTurn]) -> impl Iterator<Item = &str> {
    history
        .iter()
        .filter(|turn| turn.is_user())
        .map(|turn| turn.content.trim())
        .filter(|content| !content.is_empty())
}
