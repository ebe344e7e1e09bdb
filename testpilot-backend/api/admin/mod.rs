pub mod handlers;

use axum::Router;
use axum::routing::{get, post};

use crate::api::AppState;

/// Convex-backed admin CRUD, nested under `/api/admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/test-runs",
            get(handlers::list_test_runs).post(handlers::create_test_run),
        )
        .route(
            "/test-runs/{id}",
            get(handlers::get_test_run).delete(handlers::delete_test_run),
        )
        .route("/flows", post(handlers::create_flow))
        .route(
            "/flows/{id}",
            get(handlers::list_flows).delete(handlers::delete_flow),
        )
        .route("/stats", get(handlers::stats))
        .route("/sample-data", post(handlers::create_sample_data))
}
