//! API routes

pub mod admin;
pub mod chat;
pub mod health;
pub mod tickets;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::{optional_auth, require_auth},
    relay::ws_handler,
    state::AppState,
};

/// Global request body limit
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// CORS for the storefront and admin dashboard origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Chat relay (open to anonymous storefront visitors)
    let websocket_routes = Router::new().route("/ws/chat", get(ws_handler));

    // Assistant chat: anonymous allowed, tickets only for signed-in callers
    let public_api_routes = Router::new().route(
        "/chat",
        post(chat::chat).route_layer(middleware::from_fn_with_state(
            auth_state.clone(),
            optional_auth,
        )),
    );

    let protected_api_routes = Router::new()
        // Tickets
        .route(
            "/tickets",
            get(tickets::list_my_tickets).post(tickets::create_ticket),
        )
        // Profile
        .route("/users/me", get(users::get_me).put(users::update_me))
        // Admin (role checked inside handlers)
        .route("/admin/check", get(admin::check_admin))
        .route("/admin/tickets", get(tickets::admin_list_tickets))
        .route("/admin/tickets/:ticket_id", patch(tickets::admin_update_ticket))
        .route("/admin/users", get(users::admin_list_users))
        .layer(middleware::from_fn_with_state(auth_state, require_auth));

    let api_routes = Router::new()
        .merge(public_api_routes)
        .merge(protected_api_routes);

    Router::new()
        .merge(health_routes)
        .merge(websocket_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
