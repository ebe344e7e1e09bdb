use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::SessionError;
use crate::browser_cloud::client::TaskClient;
use crate::browser_cloud::monitor::{TaskEvent, TaskMonitor};

pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(300);

/// What a finished browser instruction reported back.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgentOutcome {
    pub task_id: Option<String>,
    pub status: String,
    pub steps: usize,
    pub output: Option<Value>,
}

/// Executes one natural-language browser instruction to completion.
#[async_trait]
pub trait BrowserAgent: Send + Sync {
    async fn run(&self, instruction: &str) -> Result<AgentOutcome, SessionError>;
}

/// Runs instructions as Browser Use Cloud tasks and follows them with the
/// task monitor until they settle.
pub struct CloudBrowserAgent {
    client: Arc<dyn TaskClient>,
    timeout: Duration,
}

impl CloudBrowserAgent {
    pub fn new(client: Arc<dyn TaskClient>) -> Self {
        Self {
            client,
            timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn follow(&self, task_id: String, cancel: CancellationToken) -> Result<AgentOutcome, SessionError> {
        let monitor = TaskMonitor::new(self.client.clone());
        let mut events = Box::pin(monitor.watch(task_id.clone(), cancel));
        let mut steps = 0;

        while let Some(event) = events.next().await {
            match event {
                TaskEvent::Step { .. } => steps += 1,
                TaskEvent::Status { .. } => {}
                TaskEvent::Completion { status, output, .. } => {
                    if status != "finished" {
                        return Err(SessionError::Agent(format!(
                            "task {task_id} ended with status {status}"
                        )));
                    }
                    return Ok(AgentOutcome {
                        task_id: Some(task_id),
                        status,
                        steps,
                        output,
                    });
                }
                TaskEvent::Error { error, .. } => return Err(SessionError::Agent(error)),
            }
        }

        Err(SessionError::Agent(format!("task {task_id} stream ended early")))
    }
}

#[async_trait]
impl BrowserAgent for CloudBrowserAgent {
    async fn run(&self, instruction: &str) -> Result<AgentOutcome, SessionError> {
        let task = self
            .client
            .create_task(instruction)
            .await
            .map_err(|e| SessionError::Agent(e.to_string()))?;

        let cancel = CancellationToken::new();
        match tokio::time::timeout(self.timeout, self.follow(task.id.clone(), cancel.clone())).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                tracing::warn!(task_id = %task.id, timeout_secs = self.timeout.as_secs(), "browser action timed out");
                Err(SessionError::Timeout(task.id))
            }
        }
    }
}
