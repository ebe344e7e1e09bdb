pub mod handlers;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/browser/test", post(handlers::self_test))
        .route("/browser/sessions", get(handlers::list_sessions))
        .route("/browser/session/create", post(handlers::create_session))
        .route("/browser/session/navigate", post(handlers::navigate))
        .route("/browser/session/click", post(handlers::click))
        .route("/browser/session/type", post(handlers::type_text))
        .route("/browser/session/{session_id}/info", get(handlers::page_info))
        .route("/browser/session/{session_id}/status", get(handlers::session_status))
        .route("/browser/session/{session_id}/logs", get(handlers::session_logs))
        .route("/browser/session/{session_id}", delete(handlers::close_session))
}
