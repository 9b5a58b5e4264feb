//! Support desk API library
//!
//! Chat relay, AI assistant, tickets and users for the storefront support
//! desk.

pub mod assistant;
pub mod auth;
pub mod config;
pub mod error;
pub mod relay;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
