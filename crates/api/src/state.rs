//! Application state

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    assistant::Responder,
    auth::{AuthState, FirebaseVerifier},
    config::Config,
    relay::RelayState,
};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub relay: RelayState,
    pub responder: Responder,
    pub verifier: Arc<FirebaseVerifier>,
}

impl AppState {
    pub fn new(
        config: Config,
        pool: PgPool,
        relay: RelayState,
        responder: Responder,
        verifier: Arc<FirebaseVerifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            relay,
            responder,
            verifier,
        }
    }

    /// State for the auth middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            verifier: self.verifier.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl FromRef<AppState> for RelayState {
    fn from_ref(state: &AppState) -> Self {
        state.relay.clone()
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth_state()
    }
}
