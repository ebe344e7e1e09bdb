/// Browser Use Cloud task endpoints. All answer 503 when
/// BROWSER_USE_API_KEY is unset.
///
/// POST /api/browser-cloud/create-task           — start one task
/// POST /api/browser-cloud/parallel-flows        — start one task per flow
/// GET  /api/browser-cloud/task/{task_id}        — current snapshot
/// GET  /api/browser-cloud/task/{task_id}/stream — SSE feed until terminal
use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::api::AppState;
use crate::api::response::{ApiError, ApiResult, success};
use crate::api::sse::event_stream;
use crate::browser_cloud::{CloudError, TaskStatusView};
use crate::browser_cloud::batch::{self, LaunchedTask};
use crate::browser_cloud::client::TaskClient;
use crate::browser_cloud::monitor::TaskMonitor;

#[derive(Deserialize)]
pub(crate) struct CreateTaskBody {
    pub task: String,
}

#[derive(Deserialize)]
pub(crate) struct ParallelFlowsBody {
    pub flows: Vec<String>,
}

fn task_client(state: &AppState) -> Result<Arc<dyn TaskClient>, ApiError> {
    state
        .task_client
        .clone()
        .ok_or_else(|| ApiError::from(CloudError::NotConfigured))
}

pub(crate) async fn create_task(
    State(state): State<AppState>,
    Json(body): Json<CreateTaskBody>,
) -> ApiResult {
    let client = task_client(&state)?;
    let instruction = body.task.trim();
    if instruction.is_empty() {
        return Err(ApiError::bad_request("task must not be empty"));
    }

    let task = client.create_task(instruction).await.map_err(|e| {
        tracing::error!(error = %e, "failed to create Browser Use Cloud task");
        ApiError::from(e)
    })?;
    Ok(Json(json!(LaunchedTask::from(task))))
}

pub(crate) async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult {
    let client = task_client(&state)?;
    let task = client.get_task(&task_id).await.map_err(|e| {
        tracing::warn!(task_id = %task_id, error = %e, "failed to fetch task status");
        ApiError::from(e)
    })?;
    Ok(Json(json!(TaskStatusView::from(task))))
}

pub(crate) async fn parallel_flows(
    State(state): State<AppState>,
    Json(body): Json<ParallelFlowsBody>,
) -> ApiResult {
    let client = task_client(&state)?;
    let launched = batch::launch(client, body.flows).await?;
    Ok(success(json!(launched)))
}

/// Cancels the monitor and logs when the SSE body is dropped.
struct StreamClosed {
    task_id: String,
    _cancel: DropGuard,
}

impl Drop for StreamClosed {
    fn drop(&mut self) {
        tracing::info!(task_id = %self.task_id, "task stream closed");
    }
}

/// The monitor is cancelled as soon as the client disconnects and the SSE
/// body is dropped.
pub(crate) async fn stream_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let client = task_client(&state)?;
    tracing::info!(task_id = %task_id, "task stream opened");

    let cancel = CancellationToken::new();
    let guard = StreamClosed {
        task_id: task_id.clone(),
        _cancel: cancel.clone().drop_guard(),
    };
    let events = TaskMonitor::new(client).watch(task_id, cancel);
    let events = async_stream::stream! {
        let _closed = guard;
        let mut events = Box::pin(events);
        while let Some(event) = futures::StreamExt::next(&mut events).await {
            yield event;
        }
    };

    Ok(event_stream(state.track_stream(), events))
}
