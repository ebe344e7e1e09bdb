use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::api::response::{ApiError, ApiResult, success};

fn default_headless() -> bool {
    true
}

#[derive(Deserialize)]
pub(crate) struct CreateSessionBody {
    pub session_id: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

#[derive(Deserialize)]
pub(crate) struct NavigateBody {
    pub session_id: String,
    pub url: String,
}

#[derive(Deserialize)]
pub(crate) struct ClickBody {
    pub session_id: String,
    pub selector: String,
}

#[derive(Deserialize)]
pub(crate) struct TypeBody {
    pub session_id: String,
    pub selector: String,
    pub text: String,
}

/// POST /api/browser/test — open, inspect and close a throwaway session.
pub(crate) async fn self_test(State(state): State<AppState>) -> ApiResult {
    let report = state.sessions.self_test().await?;
    Ok(success(report))
}

pub(crate) async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> ApiResult {
    if body.session_id.trim().is_empty() {
        return Err(ApiError::bad_request("session_id must not be empty"));
    }
    let result = state.sessions.create(&body.session_id, body.headless).await?;
    Ok(success(json!(result)))
}

pub(crate) async fn navigate(
    State(state): State<AppState>,
    Json(body): Json<NavigateBody>,
) -> ApiResult {
    let result = state.sessions.navigate(&body.session_id, &body.url).await?;
    Ok(Json(json!(result)))
}

pub(crate) async fn click(State(state): State<AppState>, Json(body): Json<ClickBody>) -> ApiResult {
    let result = state.sessions.click(&body.session_id, &body.selector).await?;
    Ok(Json(json!(result)))
}

pub(crate) async fn type_text(State(state): State<AppState>, Json(body): Json<TypeBody>) -> ApiResult {
    let result = state
        .sessions
        .type_text(&body.session_id, &body.selector, &body.text)
        .await?;
    Ok(Json(json!(result)))
}

pub(crate) async fn page_info(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let result = state.sessions.page_info(&session_id).await?;
    Ok(Json(json!(result)))
}

/// Unknown sessions report `"status": "not_found"` rather than 404.
pub(crate) async fn session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let status = state.sessions.status(&session_id).await;
    Ok(Json(json!(status)))
}

pub(crate) async fn session_logs(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let logs = state.sessions.logs(&session_id).await?;
    Ok(success(json!({
        "session_id": session_id,
        "total_logs": logs.len(),
        "logs": logs,
    })))
}

pub(crate) async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let closed = state.sessions.close(&session_id).await?;
    Ok(success(closed))
}

pub(crate) async fn list_sessions(State(state): State<AppState>) -> ApiResult {
    let sessions = state.sessions.active_sessions().await;
    Ok(success(json!({
        "total_sessions": sessions.len(),
        "active_sessions": sessions,
    })))
}
