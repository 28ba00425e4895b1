//! Route definitions for the web server

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;
use crate::AppState;

use super::api;
use super::htmx;

/// Largest request body accepted; poses and avatar requests are small
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Create the main router with all routes
pub fn create_router(app_state: Arc<AppState>, config: &HttpConfig) -> Router {
    let cors = if config.cors_enabled {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        // Pages (HTMX)
        .route("/", get(htmx::index_page))
        .route("/preview", get(htmx::preview_page))
        // HTMX partials
        .route("/htmx/gallery", get(htmx::gallery_partial))
        // API endpoints (JSON)
        .route("/api/status", get(api::get_status))
        .route("/api/config", get(api::get_config))
        .route("/api/rig/pose", get(api::get_local_pose).post(api::set_local_pose))
        .route("/api/rig/avatar", post(api::set_local_avatar))
        .route("/api/rig/transforms", get(api::get_transforms))
        // Peer API endpoints
        .route("/api/peers", get(api::list_peers))
        .route("/api/peers/:id", post(api::add_peer).delete(api::remove_peer))
        .route(
            "/api/peers/:id/pose",
            get(api::get_peer_pose).post(api::set_peer_pose),
        )
        .route("/api/peers/:id/avatar", post(api::set_peer_avatar))
        // SSE stream of the local pose
        .route("/api/stream", get(api::pose_stream))
        // Middleware
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
