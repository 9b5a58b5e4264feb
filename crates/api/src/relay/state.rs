//! Relay state
//!
//! Tracks every live connection and implements persist-then-broadcast.

use std::collections::HashMap;
use std::sync::Arc;
use supportdesk_shared::{ChatMessage, MessageStore, NewChatMessage, StoreError};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;

/// Relay state shared across all connections
#[derive(Clone)]
pub struct RelayState {
    /// All active connections indexed by session_id
    pub connections: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,

    store: Arc<dyn MessageStore>,
    history_limit: usize,
}

impl RelayState {
    /// Create relay state over a message store
    pub fn new(store: Arc<dyn MessageStore>, history_limit: usize) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            store,
            history_limit,
        }
    }

    /// The underlying message store
    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Add a connection
    pub async fn add_connection(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.session_id, Arc::clone(&conn));

        tracing::info!(
            session_id = %conn.session_id,
            total_connections = connections.len(),
            "Relay connection added"
        );

        conn
    }

    /// Remove a connection
    pub async fn remove_connection(&self, session_id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(session_id).is_some() {
            tracing::info!(
                session_id = %session_id,
                remaining_connections = connections.len(),
                "Relay connection removed"
            );
        }
    }

    /// Get total number of active connections
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// Register a connection and deliver the recent-message window to it
    ///
    /// The connection is registered before the window is loaded, so messages
    /// broadcast in between are held back and delivered after the history,
    /// minus any the history already contains. A store failure is logged and
    /// the connection simply starts without history.
    pub async fn join(&self, conn: Connection) -> Arc<Connection> {
        conn.hold_events();
        let conn = self.add_connection(conn).await;

        match self.store.recent(self.history_limit).await {
            Ok(messages) => match conn.release_with_history(messages) {
                Ok(count) => {
                    tracing::debug!(session_id = %conn.session_id, count, "Sent chat history");
                }
                Err(_) => {
                    tracing::warn!(session_id = %conn.session_id, "Connection closed before history was sent");
                }
            },
            Err(e) => {
                tracing::error!(error = %e, session_id = %conn.session_id, "Failed to load chat history");
                conn.release();
            }
        }

        conn
    }

    /// Persist a visitor message sent on `conn` and broadcast it
    pub async fn relay_client_message(&self, conn: &Connection, text: String) -> Option<ChatMessage> {
        let message = NewChatMessage::from_client(conn.session_id, text);
        self.persist_and_broadcast(conn, message).await
    }

    /// Persist a support-staff message and broadcast it
    pub async fn relay_admin_message(
        &self,
        conn: &Connection,
        text: String,
        timestamp: Option<String>,
    ) -> Option<ChatMessage> {
        let message = NewChatMessage::from_admin(text, timestamp);
        self.persist_and_broadcast(conn, message).await
    }

    /// Insert first; only a stored message (with its generated id) goes out
    async fn persist_and_broadcast(&self, conn: &Connection, message: NewChatMessage) -> Option<ChatMessage> {
        match self.store.insert(message).await {
            Ok(stored) => {
                tracing::debug!(
                    message_id = %stored.id,
                    sender = %stored.sender,
                    is_admin = stored.is_admin,
                    "Chat message persisted"
                );
                self.broadcast(ServerEvent::AdminMessage(stored.clone())).await;
                Some(stored)
            }
            Err(StoreError::Validation(reason)) => {
                tracing::warn!(session_id = %conn.session_id, reason = %reason, "Rejected chat message");
                let _ = conn.send(ServerEvent::Error { message: reason });
                None
            }
            Err(e) => {
                tracing::error!(error = %e, session_id = %conn.session_id, "Failed to persist chat message");
                None
            }
        }
    }

    /// Broadcast an event to every connection
    ///
    /// Silently ignores send errors (closed connections are cleaned up by
    /// their own handler). Returns the number of successful deliveries.
    pub async fn broadcast(&self, event: ServerEvent) -> usize {
        self.deliver(event, false).await
    }

    /// Broadcast an event to admin connections only
    pub async fn broadcast_to_admins(&self, event: ServerEvent) -> usize {
        self.deliver(event, true).await
    }

    async fn deliver(&self, event: ServerEvent, admins_only: bool) -> usize {
        let connections = self.connections.read().await;
        let mut success_count = 0;
        let mut failed_count = 0;

        for conn in connections.values().filter(|c| !admins_only || c.is_admin) {
            match conn.send(event.clone()) {
                Ok(()) => success_count += 1,
                Err(_) => failed_count += 1,
            }
        }

        tracing::debug!(
            recipients = success_count,
            failed = failed_count,
            admins_only,
            "Broadcast event to relay"
        );

        success_count
    }

    /// Get statistics about the relay
    pub async fn get_stats(&self) -> RelayStats {
        RelayStats {
            active_connections: self.connection_count().await,
        }
    }
}

/// Statistics about relay connections
#[derive(Debug, Clone, serde::Serialize)]
pub struct RelayStats {
    /// Number of active connections
    pub active_connections: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use supportdesk_shared::{InMemoryMessageStore, StoreResult};
    use tokio::sync::mpsc;

    fn relay() -> RelayState {
        RelayState::new(Arc::new(InMemoryMessageStore::new()), 50)
    }

    async fn connect(state: &RelayState) -> (Arc<Connection>, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = state.add_connection(Connection::new(tx)).await;
        (conn, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Store whose writes always fail, as when the database is down
    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn insert(&self, _message: NewChatMessage) -> StoreResult<ChatMessage> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn recent(&self, _limit: usize) -> StoreResult<Vec<ChatMessage>> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn count(&self) -> StoreResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_add_and_remove_connection() {
        let state = relay();
        let (conn, _rx) = connect(&state).await;
        assert_eq!(state.connection_count().await, 1);

        state.remove_connection(&conn.session_id).await;
        assert_eq!(state.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_history_is_latest_window_in_chronological_order() {
        let state = relay();
        let (writer, _writer_rx) = connect(&state).await;
        for i in 0..75 {
            state.relay_client_message(&writer, format!("message {}", i)).await.unwrap();
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.join(Connection::new(tx)).await;

        match drain(&mut rx).as_slice() {
            [ServerEvent::ChatHistory { messages }] => {
                assert_eq!(messages.len(), 50);
                assert_eq!(messages[0].text, "message 25");
                assert_eq!(messages[49].text, "message 74");
            }
            other => panic!("Expected a single history event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_history_with_few_messages() {
        let state = relay();
        let (writer, _writer_rx) = connect(&state).await;
        state.relay_client_message(&writer, "only one".to_string()).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.join(Connection::new(tx)).await;
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [ServerEvent::ChatHistory { messages }] if messages.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_client_message_is_persisted_once_and_broadcast_to_everyone() {
        let state = relay();
        let (sender, mut sender_rx) = connect(&state).await;
        let (_other, mut other_rx) = connect(&state).await;

        let stored = state
            .relay_client_message(&sender, "Is this in stock?".to_string())
            .await
            .unwrap();

        assert_eq!(state.store().count().await.unwrap(), 1);
        assert_eq!(stored.sender, sender.session_id.to_string());
        assert!(!stored.is_admin);

        for rx in [&mut sender_rx, &mut other_rx] {
            match drain(rx).as_slice() {
                [ServerEvent::AdminMessage(message)] => {
                    assert_eq!(message.id, stored.id);
                    assert_eq!(message.text, "Is this in stock?");
                }
                other => panic!("Expected one broadcast, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_admin_message_is_attributed_to_admin() {
        let state = relay();
        let (conn, mut rx) = connect(&state).await;

        let stored = state
            .relay_admin_message(&conn, "Your parcel ships today".to_string(), None)
            .await
            .unwrap();

        assert_eq!(stored.sender, "admin");
        assert!(stored.is_admin);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [ServerEvent::AdminMessage(m)] if m.is_admin
        ));
    }

    #[tokio::test]
    async fn test_invalid_message_is_not_broadcast() {
        let state = relay();
        let (sender, mut sender_rx) = connect(&state).await;
        let (_other, mut other_rx) = connect(&state).await;

        assert!(state.relay_client_message(&sender, "   ".to_string()).await.is_none());

        assert_eq!(state.store().count().await.unwrap(), 0);
        assert!(matches!(drain(&mut sender_rx).as_slice(), [ServerEvent::Error { .. }]));
        assert!(drain(&mut other_rx).is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_is_swallowed_without_broadcast() {
        let state = RelayState::new(Arc::new(FailingStore), 50);
        let (sender, mut sender_rx) = connect(&state).await;

        assert!(state.relay_client_message(&sender, "hello".to_string()).await.is_none());
        assert!(drain(&mut sender_rx).is_empty());
    }

    #[tokio::test]
    async fn test_history_failure_sends_nothing() {
        let state = RelayState::new(Arc::new(FailingStore), 50);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = state.join(Connection::new(tx)).await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(state.connection_count().await, 1);

        // Events are no longer held back after a failed history load
        conn.send(ServerEvent::Pong).unwrap();
        assert!(matches!(drain(&mut rx).as_slice(), [ServerEvent::Pong]));
    }

    #[tokio::test]
    async fn test_broadcast_skips_closed_connections() {
        let state = relay();
        let (_open, _open_rx) = connect(&state).await;
        let (_closed, closed_rx) = connect(&state).await;
        drop(closed_rx);

        assert_eq!(state.broadcast(ServerEvent::Pong).await, 1);
    }

    #[tokio::test]
    async fn test_admin_broadcast_skips_visitors() {
        let state = relay();
        let (_visitor, mut visitor_rx) = connect(&state).await;
        let (tx, mut admin_rx) = mpsc::unbounded_channel();
        state.add_connection(Connection::admin(tx)).await;

        assert_eq!(state.broadcast_to_admins(ServerEvent::Pong).await, 1);
        assert!(drain(&mut visitor_rx).is_empty());
        assert!(matches!(drain(&mut admin_rx).as_slice(), [ServerEvent::Pong]));
    }

    #[tokio::test]
    async fn test_stats() {
        let state = relay();
        let (_conn, _rx) = connect(&state).await;

        let stats = state.get_stats().await;
        assert_eq!(stats.active_connections, 1);
    }
}
