//! AI chat assistant
//!
//! Generates replies with a generative model, retries transient failures,
//! falls back to canned answers, and detects when a conversation should
//! become a support ticket.

pub mod conversation;
pub mod escalation;
pub mod fallback;
pub mod model;
pub mod responder;
pub mod retry;

pub use conversation::{ConversationTurn, Role};
pub use model::{ChatModel, GeminiClient, ModelError};
pub use responder::{AssistantReply, Responder, MAX_SUBJECT_CHARS};
pub use retry::RetryPolicy;
