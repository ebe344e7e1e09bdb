pub mod handlers;

use axum::Router;
use axum::routing::{get, post};

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/browser-cloud/create-task", post(handlers::create_task))
        .route("/browser-cloud/parallel-flows", post(handlers::parallel_flows))
        .route("/browser-cloud/task/{task_id}", get(handlers::get_task))
        .route("/browser-cloud/task/{task_id}/stream", get(handlers::stream_task))
}
