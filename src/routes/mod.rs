//! HTTP surface of the service.
//!
//! The only routes are the liveness probes: the orchestrator checks `/` and
//! `/health` while all real work happens on the Telegram side. Request
//! tracing is enabled so probe traffic shows up in the logs at debug level.

pub mod health;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Creates the Axum router with the health routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::health))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
