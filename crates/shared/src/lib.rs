//! Support desk shared types and utilities
//!
//! This crate contains the domain types, errors, database helpers and the chat
//! message store used by the support desk API.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use db::*;
pub use error::*;
pub use store::{InMemoryMessageStore, MessageStore, PgMessageStore};
pub use types::*;
