//! Route Configuration
//!
//! `/health` and `/metrics` are plain HTTP; every other path accepts a
//! WebSocket upgrade, and the path itself names the default resource.
//!
//! Those two paths never upgrade, so resources named `health` or `metrics`
//! cannot be reached through path resolution. Clients of such resources
//! connect on another path and send the name in the `resource` field.

use axum::{routing::get, Router};

use super::handlers;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(handlers::health::health_check))
        // Prometheus metrics endpoint
        .route("/metrics", get(handlers::metrics::metrics_handler))
        // WebSocket gateway on every other path
        .fallback(ws_handler)
        .layer(logging::create_trace_layer())
        .layer(cors::create_cors_layer(&state.settings.cors))
        .with_state(state)
}
