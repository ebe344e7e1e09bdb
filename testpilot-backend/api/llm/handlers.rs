use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::api::response::{ApiError, ApiResult, success};
use crate::llm::flows::DEFAULT_FLOW_COUNT;

#[derive(Deserialize)]
pub(crate) struct GenerateFlowsBody {
    pub prompt: String,
    pub website_url: Option<String>,
    pub num_flows: Option<usize>,
}

/// POST /api/generate-flows — ask the model for browser test flows.
///
/// Failures keep the response shape: an empty `flows` list plus the
/// failure `kind` and elapsed `generation_time`.
#[tracing::instrument(skip_all, fields(num_flows))]
pub(crate) async fn generate_flows(
    State(state): State<AppState>,
    Json(body): Json<GenerateFlowsBody>,
) -> ApiResult {
    let Some(generator) = state.flow_generator.clone() else {
        return Err(ApiError::unavailable(
            "LLM service not available. Please set GEMINI_API_KEY.",
        )
        .with("flows", json!([])));
    };

    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::bad_request("prompt must not be empty").with("flows", json!([])));
    }
    let num_flows = body.num_flows.unwrap_or(DEFAULT_FLOW_COUNT);
    if num_flows == 0 {
        return Err(ApiError::bad_request("num_flows must be at least 1").with("flows", json!([])));
    }
    tracing::Span::current().record("num_flows", num_flows);

    let website_url = body
        .website_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    let started = Instant::now();
    let result = generator.generate(prompt, website_url, num_flows).await;
    let generation_time = elapsed_secs(started);

    match result {
        Ok(flows) => {
            tracing::info!(count = flows.len(), generation_time, "flows generated");
            Ok(success(json!({
                "message": format!("Successfully generated {} test flows", flows.len()),
                "flows": flows,
                "generation_time": generation_time,
            })))
        }
        Err(e) => Err(ApiError::from(e)
            .with("flows", json!([]))
            .with("generation_time", json!(generation_time))),
    }
}

fn elapsed_secs(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100.0).round() / 100.0
}
