pub mod batch;
pub mod client;
pub mod monitor;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provider status strings after which a task never changes again.
pub const TERMINAL_STATUSES: [&str; 3] = ["finished", "failed", "stopped"];

pub fn is_terminal_status(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

/// Snapshot of a Browser Use Cloud task as last observed.
///
/// Steps are opaque provider records; they are only ever counted and
/// forwarded, never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteTask {
    pub id: String,
    pub session_id: String,
    pub status: String,
    #[serde(default)]
    pub steps: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl RemoteTask {
    /// A freshly created task before its first status poll.
    pub fn started(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            session_id: id.clone(),
            id,
            status: "started".to_string(),
            steps: Vec::new(),
            output: None,
            live_url: None,
            is_success: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        is_terminal_status(&self.status)
    }
}

/// Wire shape of a task status answer. Optional fields are sent as `null`
/// rather than omitted.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusView {
    pub task_id: String,
    pub session_id: String,
    pub status: String,
    pub is_success: Option<bool>,
    pub live_url: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub steps_count: usize,
    pub done_output: Option<Value>,
    pub steps: Vec<Value>,
}

impl From<RemoteTask> for TaskStatusView {
    fn from(task: RemoteTask) -> Self {
        Self {
            task_id: task.id,
            session_id: task.session_id,
            status: task.status,
            is_success: task.is_success,
            live_url: task.live_url,
            started_at: task.started_at,
            finished_at: task.finished_at,
            steps_count: task.steps.len(),
            done_output: task.output,
            steps: task.steps,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CloudError {
    #[error("Browser Use Cloud API key not configured")]
    NotConfigured,

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("Browser Use Cloud returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    Invalid(String),
}
