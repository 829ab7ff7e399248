// ABOUTME: Route definitions for the parlor HTTP API.
// ABOUTME: Assembles the message routes, health check, and optional static assets into one Router.

use std::path::Path;

use axum::Router;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;

/// Build the complete Axum router. When `static_dir` is given, requests
/// that match no API route are served from it.
pub fn create_router(state: SharedState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route(
            "/api/messages",
            get(api::messages::list_messages).post(api::messages::create_message),
        )
        .route("/api/messages/stream", get(api::stream::message_stream))
        .route(
            "/api/messages/{id}",
            get(api::messages::get_message)
                .put(api::messages::update_message)
                .delete(api::messages::delete_message),
        );

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.with_state(state).layer(TraceLayer::new_for_http())
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
