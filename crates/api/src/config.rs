//! Application configuration

use std::env;
use std::str::FromStr;

/// Default Google endpoint publishing the keys that sign Firebase ID tokens
pub const DEFAULT_FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub cors_allowed_origins: Vec<String>,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Chat relay
    pub chat_history_limit: usize,

    // Generative AI
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base_url: String,
    pub ai_max_retries: usize,
    pub ai_retry_base_delay_ms: u64,
    pub ai_request_timeout_ms: u64,

    // Firebase Auth
    pub firebase_project_id: String,
    pub firebase_jwks_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,

            // Chat relay
            chat_history_limit: parse_or("CHAT_HISTORY_LIMIT", 50)?,

            // Generative AI
            gemini_api_key: env::var("GEMINI_API_KEY")
                .or_else(|_| env::var("VITE_GEMINI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            gemini_api_base_url: env::var("GEMINI_API_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            ai_max_retries: parse_or("AI_MAX_RETRIES", 3)?,
            ai_retry_base_delay_ms: parse_or("AI_RETRY_BASE_DELAY_MS", 1000)?,
            ai_request_timeout_ms: parse_or("AI_REQUEST_TIMEOUT_MS", 30_000)?,

            // Firebase Auth
            firebase_project_id: env::var("FIREBASE_PROJECT_ID")
                .map_err(|_| ConfigError::Missing("FIREBASE_PROJECT_ID"))?,
            firebase_jwks_url: env::var("FIREBASE_JWKS_URL")
                .unwrap_or_else(|_| DEFAULT_FIREBASE_JWKS_URL.to_string()),
        })
    }
}

/// Parse an optional numeric variable, keeping the default when it is unset
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
