pub mod handlers;

use axum::Router;
use axum::routing::post;

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/generate-flows", post(handlers::generate_flows))
}
