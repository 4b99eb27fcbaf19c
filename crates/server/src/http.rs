//! HTTP surface (C13): the WebSocket upgrade route plus `/health`,
//! `/ready`, `/metrics`, and `/admin/reload-config`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use stt_gateway_config::Settings;

use crate::state::AppState;
use crate::websocket;

pub fn router(state: Arc<AppState>) -> Router {
    let ws_path = state.settings().server.ws_path.clone();
    let cors = build_cors(&state);

    Router::new()
        .route(&ws_path, get(websocket::upgrade))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .route("/admin/reload-config", post(reload_config))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

fn build_cors(state: &Arc<AppState>) -> CorsLayer {
    let settings = state.settings();
    if !settings.server.cors_enabled {
        return CorsLayer::new();
    }
    if settings.server.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<axum::http::HeaderValue> = settings
        .server
        .cors_origins
        .iter()
        .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
        .collect();
    CorsLayer::new().allow_origin(origins).allow_methods(tower_http::cors::Any)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Liveness aside, readiness also reports how many sessions are currently
/// live — useful for a load balancer to prefer idle instances.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "ready": true, "active_sessions": state.registry.len() }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    crate::metrics::render(state.metrics_handle.clone()).await
}

/// Re-validates and swaps `Settings` without a restart (§4.13). Sessions
/// already in flight keep the settings they started with.
async fn reload_config(
    State(state): State<Arc<AppState>>,
    Json(new_settings): Json<Settings>,
) -> impl IntoResponse {
    match state.reload_settings(new_settings) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}
