use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use super::client::TaskClient;
use super::{CloudError, RemoteTask};

#[derive(Debug, Clone, Serialize)]
pub struct LaunchedTask {
    pub task_id: String,
    pub session_id: String,
    pub live_url: Option<String>,
    pub status: String,
}

impl From<RemoteTask> for LaunchedTask {
    fn from(task: RemoteTask) -> Self {
        Self {
            task_id: task.id,
            session_id: task.session_id,
            live_url: task.live_url,
            status: task.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchLaunch {
    pub batch_id: String,
    pub tasks: Vec<LaunchedTask>,
    pub total_tasks: usize,
}

/// A batch where at least one creation failed.
///
/// Tasks that were created before the failure surfaced keep running
/// upstream; their ids are carried here so callers can report them.
#[derive(thiserror::Error, Debug)]
#[error("parallel task creation failed ({failed} of {requested}): {source}")]
pub struct BatchError {
    pub requested: usize,
    pub failed: usize,
    pub created: Vec<String>,
    #[source]
    pub source: CloudError,
}

/// Create one remote task per flow instruction, all concurrently.
///
/// Waits for every creation to settle; the first failure in input order is
/// returned.
pub async fn launch(
    client: Arc<dyn TaskClient>,
    flows: Vec<String>,
) -> Result<BatchLaunch, BatchError> {
    if flows.is_empty() {
        return Err(BatchError {
            requested: 0,
            failed: 0,
            created: Vec::new(),
            source: CloudError::Invalid("at least one flow is required".into()),
        });
    }

    let batch_id = Uuid::new_v4().to_string();
    let requested = flows.len();
    tracing::info!(batch_id = %batch_id, count = requested, "creating parallel Browser Use Cloud tasks");

    let results = join_all(flows.iter().map(|flow| {
        let client = client.clone();
        async move { client.create_task(flow).await }
    }))
    .await;

    let mut tasks = Vec::with_capacity(requested);
    let mut first_error = None;
    let mut failed = 0;
    for result in results {
        match result {
            Ok(task) => tasks.push(LaunchedTask::from(task)),
            Err(e) => {
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if let Some(source) = first_error {
        let created: Vec<String> = tasks.into_iter().map(|t| t.task_id).collect();
        tracing::error!(
            batch_id = %batch_id,
            failed,
            orphaned = ?created,
            error = %source,
            "parallel task creation failed"
        );
        return Err(BatchError {
            requested,
            failed,
            created,
            source,
        });
    }

    tracing::info!(batch_id = %batch_id, count = tasks.len(), "parallel tasks created");
    Ok(BatchLaunch {
        batch_id,
        total_tasks: tasks.len(),
        tasks,
    })
}
