// ABOUTME: HTTP server for parlor, exposing the message collection over REST and SSE.
// ABOUTME: Uses Axum with shared state holding the store handle and the change broadcaster.

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, ParlorConfig};
pub use error::ApiError;
pub use routes::create_router;
