use axum::Router;
use axum::response::IntoResponse;
use hyper::header::{HeaderName, HeaderValue};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::middleware;
use super::response::ApiError;
use super::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(super::system::root_router())
        .nest("/api", api_router())
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::correlation_middleware))
        .layer(axum::middleware::from_fn(
            middleware::enrich_current_span_middleware,
        ))
}

fn api_router() -> Router<AppState> {
    Router::new()
        .merge(super::system::router())
        .merge(super::llm::router())
        .merge(super::browser_cloud::router())
        .merge(super::browser::router())
        .merge(super::credentials::router())
        .nest("/admin", super::admin::router())
}

/// `*` allows any origin; otherwise only the listed ones. An empty list
/// allows none.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static(middleware::CORRELATION_HEADER),
            HeaderName::from_static(middleware::PROCESS_TIME_HEADER),
        ])
}

async fn not_found(req: axum::extract::Request) -> impl IntoResponse {
    tracing::warn!("unhandled path: {}", req.uri());
    ApiError::not_found(format!("no route for {}", req.uri().path()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::testing::{bare_state, get, send};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let (status, body) = send(bare_state(), get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn responses_carry_correlation_headers() {
        let req = Request::builder()
            .uri("/health")
            .header("X-Correlation-ID", "corr-42")
            .body(Body::empty())
            .unwrap();
        let response = super::super::create_app(bare_state()).oneshot(req).await.unwrap();
        assert_eq!(response.headers()["x-correlation-id"], "corr-42");
        assert!(response.headers().contains_key("x-process-time"));
    }

    #[tokio::test]
    async fn configured_origin_is_allowed() {
        let req = Request::builder()
            .uri("/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = super::super::create_app(bare_state()).oneshot(req).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn empty_origin_list_allows_no_origin() {
        let mut state = bare_state();
        let mut config = (*state.config).clone();
        config.cors_origins.clear();
        state.config = Arc::new(config);

        let req = Request::builder()
            .uri("/health")
            .header("Origin", "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = super::super::create_app(state).oneshot(req).await.unwrap();
        assert!(!response.headers().contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn exposes_correlation_headers_to_browsers() {
        let req = Request::builder()
            .uri("/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = super::super::create_app(bare_state()).oneshot(req).await.unwrap();
        let exposed = response.headers()["access-control-expose-headers"]
            .to_str()
            .unwrap()
            .to_string();
        assert!(exposed.contains("x-correlation-id"));
        assert!(exposed.contains("x-process-time"));
    }
}
