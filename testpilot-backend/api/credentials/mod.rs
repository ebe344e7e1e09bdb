pub mod handlers;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/credentials/add", post(handlers::add_credentials))
        .route("/credentials/list", get(handlers::list_credentials))
        .route("/credentials/lookup", get(handlers::lookup_credentials))
        .route("/credentials/{domain}", delete(handlers::remove_credentials))
}
