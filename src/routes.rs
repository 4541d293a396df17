// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route definitions and router assembly.

use crate::handlers;
use crate::AppState;
use axum::{
    response::Html,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router: API, WebSocket endpoint, and demo page.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(demo_page))
        .route("/ws", get(handlers::ws_handler))
        .route("/health", get(handlers::health))
        .route("/api/mqtt/connect", post(handlers::mqtt_connect))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the embedded demo page
async fn demo_page() -> Html<&'static str> {
    Html(include_str!("demo.html"))
}
