use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, Uri},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::Span;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Correlation id a request is logged under: the caller's `X-Correlation-ID`
/// when present, otherwise `req_<unix millis>`.
pub fn correlation_id(req: &Request<Body>) -> String {
    req.headers()
        .get(CORRELATION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("req_{}", Utc::now().timestamp_millis()))
}

/// Logs start and completion of every request and echoes the correlation id
/// and elapsed seconds back as response headers.
pub async fn correlation_middleware(mut req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let id = correlation_id(&req);
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if let Ok(value) = HeaderValue::from_str(&id) {
        req.headers_mut().insert(CORRELATION_HEADER, value);
    }
    tracing::info!(correlation_id = %id, %method, %path, "request started");

    let mut response = next.run(req).await;

    let elapsed = started.elapsed();
    tracing::info!(
        correlation_id = %id,
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = elapsed.as_millis() as u64,
        "request completed"
    );

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&id) {
        headers.insert(CORRELATION_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{:.4}", elapsed.as_secs_f64())) {
        headers.insert(PROCESS_TIME_HEADER, value);
    }
    response
}

pub async fn enrich_current_span_middleware(req: Request<Body>, next: Next) -> Response {
    let uri: &Uri = req.uri();

    let host = req
        .headers()
        .get("host")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("UNKNOWN");

    let current_span = Span::current();
    current_span.record("http.uri", uri.path());
    current_span.record("http.host", host);
    if let Some(query) = uri.query() {
        current_span.record("http.query", query);
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_correlation_id_is_reused() {
        let req = Request::builder()
            .header("X-Correlation-ID", "abc-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(correlation_id(&req), "abc-123");
    }

    #[test]
    fn missing_correlation_id_is_generated() {
        let req = Request::builder().body(Body::empty()).unwrap();
        let id = correlation_id(&req);
        assert!(id.starts_with("req_"));
        assert!(id[4..].parse::<i64>().is_ok());
    }
}
