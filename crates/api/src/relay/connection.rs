//! Relay connection

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use supportdesk_shared::ChatMessage;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::ServerEvent;

/// Represents an active WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique session ID, also used as the sender id of client messages
    pub session_id: Uuid,

    /// Opened with a verified admin token; only admins see ticket announcements
    pub is_admin: bool,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    /// Events held back while the history window is loading
    backlog: Mutex<Option<Vec<ServerEvent>>>,
}

impl Connection {
    /// Create a new visitor connection
    pub fn new(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            is_admin: false,
            sender,
            backlog: Mutex::new(None),
        }
    }

    /// Create a connection for a verified admin
    pub fn admin(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            is_admin: true,
            ..Self::new(sender)
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Ok(()) if sent successfully, Err if connection is closed
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        let mut backlog = self.lock_backlog();
        if let Some(pending) = backlog.as_mut() {
            pending.push(event);
            return Ok(());
        }
        self.sender.send(event)
    }

    /// Queue events instead of sending them until history is released
    pub(crate) fn hold_events(&self) {
        *self.lock_backlog() = Some(Vec::new());
    }

    /// Send the history window, then the held-back events it doesn't already contain
    ///
    /// Returns the number of history messages sent.
    #[allow(clippy::result_large_err)]
    pub(crate) fn release_with_history(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<usize, mpsc::error::SendError<ServerEvent>> {
        let mut backlog = self.lock_backlog();
        let pending = backlog.take().unwrap_or_default();

        let in_history: HashSet<Uuid> = messages.iter().map(|m| m.id).collect();
        let count = messages.len();
        self.sender.send(ServerEvent::ChatHistory { messages })?;

        for event in pending {
            if let ServerEvent::AdminMessage(message) = &event {
                if in_history.contains(&message.id) {
                    continue;
                }
            }
            self.sender.send(event)?;
        }

        Ok(count)
    }

    /// Flush held-back events without a history batch
    pub(crate) fn release(&self) {
        let mut backlog = self.lock_backlog();
        for event in backlog.take().unwrap_or_default() {
            if self.sender.send(event).is_err() {
                break;
            }
        }
    }

    fn lock_backlog(&self) -> MutexGuard<'_, Option<Vec<ServerEvent>>> {
        self.backlog.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
