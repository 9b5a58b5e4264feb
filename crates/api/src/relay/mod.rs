//! Real-time chat relay
//!
//! Every chat message is persisted and then rebroadcast to all connected
//! clients, the sender included. New connections receive the most recent
//! messages once, as a history batch.
//!
//! # Architecture
//!
//! - **Connection**: a connected WebSocket client and its outbound channel
//! - **State**: connection registry plus the persist-then-broadcast logic
//! - **Handler**: Axum WebSocket route handler
//! - **Events**: Type-safe event definitions for client/server communication

pub mod connection;
pub mod events;
pub mod handler;
pub mod state;

pub use handler::ws_handler;
pub use state::RelayState;
