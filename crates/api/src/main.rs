//! Support desk API server

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use supportdesk_api::{
    assistant::{GeminiClient, Responder, RetryPolicy},
    auth::FirebaseVerifier,
    relay::RelayState,
    routes::create_router,
    AppState, Config,
};
use supportdesk_shared::{create_pool, run_migrations, PgMessageStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("supportdesk_api=debug,tower_http=info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    let relay = RelayState::new(
        Arc::new(PgMessageStore::new(pool.clone())),
        config.chat_history_limit,
    );

    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set, assistant will answer with canned replies");
    }
    let model = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_api_base_url.clone(),
        Duration::from_millis(config.ai_request_timeout_ms),
    );
    let responder = Responder::new(
        Arc::new(model),
        RetryPolicy::new(
            config.ai_max_retries,
            Duration::from_millis(config.ai_retry_base_delay_ms),
        ),
    );

    let verifier = Arc::new(FirebaseVerifier::new(
        config.firebase_project_id.clone(),
        config.firebase_jwks_url.clone(),
    ));

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config, pool, relay, responder, verifier);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    tracing::info!(address = %bind_address, "Support desk API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server");
}
