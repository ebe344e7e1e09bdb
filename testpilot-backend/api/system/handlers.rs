/// Service info, liveness, dependency health, and the demo SSE streams.
///
/// GET  /                     — service name and version
/// GET  /health               — liveness plus which providers are enabled
/// GET  /api/health/services  — probe every dependency
/// GET  /api/message          — connectivity check
/// GET  /api/test             — echo request metadata and correlation id
/// GET  /api/stats            — uptime and open stream count
/// GET  /api/stream           — demo event stream
/// GET  /api/stream/simple    — ten messages, one per second
use std::convert::Infallible;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::sse::{Event, Sse};
use chrono::Utc;
use futures::stream::Stream;
use serde_json::{Value, json};

use crate::api::AppState;
use crate::api::middleware::CORRELATION_HEADER;
use crate::api::response::success;
use crate::api::sse::event_stream;
use crate::streaming;

const SERVICE_NAME: &str = "testpilot-api";

pub(crate) async fn root() -> Json<Value> {
    Json(json!({
        "message": "TestPilot API is running!",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(crate) async fn liveness(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "llm_enabled": state.flow_generator.is_some(),
        "browser_use_enabled": state.task_client.is_some(),
    }))
}

pub(crate) async fn service_health(State(state): State<AppState>) -> Json<Value> {
    let report = state.health.check_all().await;
    Json(serde_json::to_value(report).unwrap_or_default())
}

pub(crate) async fn message() -> Json<Value> {
    success(json!({ "message": "Hello from the TestPilot backend!" }))
}

pub(crate) async fn connection_test(method: Method, uri: Uri, headers: HeaderMap) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string()
    };
    let correlation_id = header(CORRELATION_HEADER);
    tracing::info!(correlation_id = %correlation_id, "connection test requested");

    success(json!({
        "message": "Test endpoint working correctly!",
        "correlation_id": correlation_id,
        "test_data": {
            "frontend_backend_connection": "successful",
            "logging_system": "operational",
            "timestamp_server": Utc::now().to_rfc3339(),
            "request_method": method.as_str(),
            "request_url": uri.to_string(),
            "user_agent": header("user-agent"),
        },
    }))
}

pub(crate) async fn stats(State(state): State<AppState>) -> Json<Value> {
    let uptime = Utc::now() - state.started_at;
    success(json!({
        "message": "System statistics retrieved successfully",
        "data": {
            "system_status": "operational",
            "active_streams": state.open_streams(),
            "active_browser_sessions": state.sessions.active_sessions().await.len(),
            "started_at": state.started_at.to_rfc3339(),
            "uptime_seconds": uptime.num_seconds(),
            "version": env!("CARGO_PKG_VERSION"),
        },
    }))
}

pub(crate) async fn demo_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("demo stream opened");
    let events = streaming::demo_stream(
        state.config.stream_update_interval,
        state.config.max_stream_messages,
    );
    event_stream(state.track_stream(), events)
}

pub(crate) async fn simple_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("simple stream opened");
    event_stream(
        state.track_stream(),
        streaming::simple_stream(streaming::SIMPLE_STREAM_INTERVAL),
    )
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{bare_state, get, send};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn root_reports_version() {
        let (status, body) = send(bare_state(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn liveness_reports_disabled_providers() {
        let (status, body) = send(bare_state(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["llm_enabled"], false);
        assert_eq!(body["browser_use_enabled"], false);
    }

    #[tokio::test]
    async fn test_endpoint_echoes_correlation_id() {
        let req = Request::builder()
            .uri("/api/test")
            .header("X-Correlation-ID", "abc")
            .header("user-agent", "probe/1.0")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(bare_state(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["correlation_id"], "abc");
        assert_eq!(body["test_data"]["request_method"], "GET");
        assert_eq!(body["test_data"]["user_agent"], "probe/1.0");
    }

    #[tokio::test]
    async fn stats_counts_no_streams_when_idle() {
        let (_, body) = send(bare_state(), get("/api/stats")).await;
        assert_eq!(body["data"]["active_streams"], 0);
        assert_eq!(body["data"]["active_browser_sessions"], 0);
    }

    #[tokio::test]
    async fn service_health_without_providers_is_unhealthy() {
        let (status, body) = send(bare_state(), get("/api/health/services")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall_status"], "unhealthy");
        assert_eq!(body["summary"]["total_services"], 4);
    }

    #[test]
    fn stream_guard_tracks_open_streams() {
        let state = bare_state();
        let guard = state.track_stream();
        assert_eq!(state.open_streams(), 1);
        drop(guard);
        assert_eq!(state.open_streams(), 0);
    }
}
