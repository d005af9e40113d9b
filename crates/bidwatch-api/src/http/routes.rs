//! HTTP route definitions.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;
use crate::websocket::ws_handler;

/// Create the router.
///
/// ```text
/// /api
///   POST /api/session/start      - Start monitoring a URL
///   POST /api/session/stop       - Stop the current session
///   GET  /api/session/diagnostic - PNG captured on failure
///   GET  /api/status             - Session summary, snapshot, viewer count
///   POST /api/actions            - Dispatch a viewer action
///
/// /health - Liveness + version
/// /ws     - Viewer WebSocket (?session=<id>)
/// ```
pub fn create_router(state: Arc<AppState>) -> Router {
    let session_routes = Router::new()
        .route("/start", post(handlers::start_session))
        .route("/stop", post(handlers::stop_session))
        .route("/diagnostic", get(handlers::get_diagnostic));

    let api_routes = Router::new()
        .nest("/session", session_routes)
        .route("/status", get(handlers::get_status))
        .route("/actions", post(handlers::dispatch_action));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
