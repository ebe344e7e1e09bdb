/// Admin endpoints over the Convex `testRuns` and `flows` tables.
///
/// GET    /api/admin/test-runs?limit=&status=  — page of test runs
/// POST   /api/admin/test-runs                 — create a test run
/// GET    /api/admin/test-runs/{id}            — one test run (404 if absent)
/// DELETE /api/admin/test-runs/{id}            — delete a test run
/// GET    /api/admin/flows/{test_run_id}       — flows of a test run
/// POST   /api/admin/flows                     — create a flow
/// DELETE /api/admin/flows/{flow_id}           — delete a flow
/// GET    /api/admin/stats                     — test run statistics
/// POST   /api/admin/sample-data               — seed template data
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::api::AppState;
use crate::api::response::{ApiError, ApiResult};
use crate::convex::{ConvexError, DocumentStore, samples};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Deserialize)]
pub(crate) struct ListQuery {
    pub limit: Option<u32>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct TestRunBody {
    pub name: String,
    pub prompt: String,
    pub description: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FlowBody {
    pub test_run_id: String,
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub order: u32,
    pub estimated_duration_minutes: Option<u32>,
    pub success_criteria: Option<Vec<String>>,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SampleDataBody {
    #[serde(default = "default_sample_runs")]
    pub test_runs: usize,
    #[serde(default = "default_sample_flows")]
    pub flows_per_run: usize,
}

fn default_sample_runs() -> usize {
    samples::MAX_SAMPLE_RUNS
}

fn default_sample_flows() -> usize {
    samples::MAX_SAMPLE_FLOWS_PER_RUN
}

fn store(state: &AppState) -> Result<Arc<dyn DocumentStore>, ApiError> {
    state
        .document_store
        .clone()
        .ok_or_else(|| ApiError::from(ConvexError::NotConfigured))
}

async fn call(state: &AppState, function: &str, args: Value) -> Result<Value, ApiError> {
    store(state)?.call(function, args).await.map_err(|e| {
        tracing::error!(function, error = %e, "Convex call failed");
        ApiError::from(e)
    })
}

/// Insert optional fields only when they carry something.
fn put_if<T: serde::Serialize>(args: &mut Value, key: &str, value: Option<T>) {
    if let (Some(value), Some(map)) = (value, args.as_object_mut()) {
        map.insert(key.to_string(), json!(value));
    }
}

pub(crate) async fn list_test_runs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(ApiError::new(
            hyper::StatusCode::UNPROCESSABLE_ENTITY,
            format!("limit must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }

    let mut args = json!({ "paginationOpts": { "numItems": limit, "cursor": null } });
    put_if(&mut args, "status", query.status.filter(|s| !s.is_empty()));

    let result = call(&state, "testRuns:list", args).await?;
    let page = result.get("page").cloned().unwrap_or_else(|| json!([]));
    Ok(Json(page))
}

pub(crate) async fn create_test_run(
    State(state): State<AppState>,
    Json(body): Json<TestRunBody>,
) -> ApiResult {
    let mut args = json!({ "name": body.name, "prompt": body.prompt });
    put_if(&mut args, "description", body.description.filter(|d| !d.is_empty()));
    put_if(&mut args, "metadata", body.metadata.filter(|m| !m.is_empty()));

    let id = call(&state, "testRuns:create", args).await?;
    tracing::info!(test_run_id = %id, "test run created");
    Ok(Json(json!({ "testRunId": id })))
}

pub(crate) async fn get_test_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let run = call(&state, "testRuns:get", json!({ "testRunId": id })).await?;
    if run.is_null() {
        return Err(ApiError::not_found("Test run not found"));
    }
    Ok(Json(run))
}

pub(crate) async fn delete_test_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    call(&state, "testRuns:remove", json!({ "testRunId": id })).await?;
    Ok(Json(json!({ "message": "Test run deleted successfully" })))
}

pub(crate) async fn list_flows(
    State(state): State<AppState>,
    Path(test_run_id): Path<String>,
) -> ApiResult {
    let flows = call(&state, "flows:listByTestRun", json!({ "testRunId": test_run_id })).await?;
    Ok(Json(if flows.is_null() { json!([]) } else { flows }))
}

pub(crate) async fn create_flow(
    State(state): State<AppState>,
    Json(body): Json<FlowBody>,
) -> ApiResult {
    let mut args = json!({
        "testRunId": body.test_run_id,
        "name": body.name,
        "description": body.description,
        "instructions": body.instructions,
        "order": body.order,
    });
    put_if(&mut args, "estimatedDurationMinutes", body.estimated_duration_minutes.filter(|m| *m > 0));
    put_if(&mut args, "successCriteria", body.success_criteria.filter(|c| !c.is_empty()));
    put_if(&mut args, "metadata", body.metadata.filter(|m| !m.is_empty()));

    let id = call(&state, "flows:create", args).await?;
    Ok(Json(json!({ "flowId": id })))
}

pub(crate) async fn delete_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
) -> ApiResult {
    call(&state, "flows:remove", json!({ "flowId": flow_id })).await?;
    Ok(Json(json!({ "message": "Flow deleted successfully" })))
}

pub(crate) async fn stats(State(state): State<AppState>) -> ApiResult {
    let store = store(&state)?;
    let stats = store
        .call("testRuns:getStats", json!({}))
        .await
        .map_err(ApiError::from)?;
    Ok(Json(json!({
        "testRuns": stats,
        "timestamp": Utc::now().to_rfc3339(),
        "convexUrl": store.deployment_url(),
    })))
}

pub(crate) async fn create_sample_data(
    State(state): State<AppState>,
    Json(body): Json<SampleDataBody>,
) -> ApiResult {
    let store = store(&state)?;
    let created = samples::seed(store.as_ref(), body.test_runs, body.flows_per_run)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to create sample data");
            ApiError::from(e)
        })?;
    Ok(Json(created))
}
