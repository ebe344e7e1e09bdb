pub mod handlers;

use axum::Router;
use axum::routing::get;

use crate::api::AppState;

/// Unprefixed service info and liveness.
pub fn root_router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::liveness))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health/services", get(handlers::service_health))
        .route("/message", get(handlers::message))
        .route("/test", get(handlers::connection_test))
        .route("/stats", get(handlers::stats))
        .route("/stream", get(handlers::demo_stream))
        .route("/stream/simple", get(handlers::simple_stream))
}
