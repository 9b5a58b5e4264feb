//! Helpers shared by handler tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use supportdesk_shared::{create_pool, run_migrations, InMemoryMessageStore};
use uuid::Uuid;

use crate::{
    assistant::{ChatModel, ModelError, Responder, RetryPolicy},
    auth::{AuthUser, FirebaseVerifier},
    config::Config,
    relay::RelayState,
    state::AppState,
};

pub(crate) fn test_config(database_url: &str) -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        cors_allowed_origins: vec!["http://localhost:5173".to_string()],
        database_url: database_url.to_string(),
        database_max_connections: 2,
        chat_history_limit: 50,
        gemini_api_key: None,
        gemini_model: "gemini-test".to_string(),
        gemini_api_base_url: "http://127.0.0.1:1".to_string(),
        ai_max_retries: 1,
        ai_retry_base_delay_ms: 1,
        ai_request_timeout_ms: 100,
        firebase_project_id: "supportdesk-test".to_string(),
        firebase_jwks_url: "http://127.0.0.1:1/jwks".to_string(),
    }
}

/// Model that answers every prompt with the same text
pub(crate) struct FixedModel(pub String);

#[async_trait]
impl ChatModel for FixedModel {
    async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
        Ok(self.0.clone())
    }
}

/// App state over a pool and model, with an in-memory relay
pub(crate) fn app_state(config: Config, pool: PgPool, model: Arc<dyn ChatModel>) -> AppState {
    let relay = RelayState::new(Arc::new(InMemoryMessageStore::new()), config.chat_history_limit);
    let responder = Responder::new(model, RetryPolicy::new(1, Duration::from_millis(1)));
    let verifier = Arc::new(FirebaseVerifier::new(
        config.firebase_project_id.clone(),
        config.firebase_jwks_url.clone(),
    ));
    AppState::new(config, pool, relay, responder, verifier)
}

/// Migrated pool for `DATABASE_URL`
pub(crate) async fn db_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let pool = create_pool(&url, 2).await.expect("Failed to create pool");
    run_migrations(&pool).await.expect("Migrations failed");
    pool
}

/// App state backed by the test database
pub(crate) async fn db_state(model: Arc<dyn ChatModel>) -> AppState {
    let pool = db_pool().await;
    let url = std::env::var("DATABASE_URL").unwrap_or_default();
    app_state(test_config(&url), pool, model)
}

/// Insert a user row with a unique Firebase uid
pub(crate) async fn create_user(pool: &PgPool, is_admin: bool) -> AuthUser {
    let firebase_uid = format!("test-{}", Uuid::new_v4());
    let email = format!("{}@example.com", firebase_uid);

    let (user_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (id, firebase_uid, email, is_admin) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(&firebase_uid)
    .bind(&email)
    .bind(is_admin)
    .fetch_one(pool)
    .await
    .expect("Failed to insert user");

    AuthUser {
        user_id,
        firebase_uid,
        email: Some(email),
        is_admin,
    }
}
