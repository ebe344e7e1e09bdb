use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{CloudError, RemoteTask};

#[async_trait]
pub trait TaskClient: Send + Sync {
    async fn create_task(&self, instruction: &str) -> Result<RemoteTask, CloudError>;
    async fn get_task(&self, task_id: &str) -> Result<RemoteTask, CloudError>;
    async fn ping(&self) -> Result<StatusCode, CloudError>;
}

pub struct HttpTaskClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct CreatedTask {
    id: String,
}

/// Wire shape of `GET /task/{id}`. Every field but the id is optional upstream.
#[derive(Deserialize)]
struct TaskPayload {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    steps: Option<Vec<Value>>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    live_url: Option<String>,
    #[serde(default)]
    is_success: Option<bool>,
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    finished_at: Option<String>,
}

impl TaskPayload {
    fn into_task(self, task_id: &str) -> RemoteTask {
        RemoteTask {
            id: task_id.to_string(),
            session_id: self.session_id.unwrap_or_else(|| task_id.to_string()),
            status: self.status.unwrap_or_else(|| "unknown".to_string()),
            steps: self.steps.unwrap_or_default(),
            output: self.output.filter(|v| !v.is_null()),
            live_url: self.live_url,
            is_success: self.is_success,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

impl HttpTaskClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TaskClient for HttpTaskClient {
    async fn create_task(&self, instruction: &str) -> Result<RemoteTask, CloudError> {
        let url = format!("{}/run-task", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "task": instruction }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CloudError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedTask = resp
            .json()
            .await
            .map_err(|e| CloudError::Decode(format!("create-task response: {e}")))?;

        tracing::info!(task_id = %created.id, "Browser Use Cloud task created");
        Ok(RemoteTask::started(created.id))
    }

    async fn get_task(&self, task_id: &str) -> Result<RemoteTask, CloudError> {
        let url = format!("{}/task/{task_id}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CloudError::NotFound(task_id.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CloudError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let payload: TaskPayload = resp
            .json()
            .await
            .map_err(|e| CloudError::Decode(format!("task {task_id}: {e}")))?;

        Ok(payload.into_task(task_id))
    }

    async fn ping(&self) -> Result<StatusCode, CloudError> {
        let url = format!("{}/ping", self.base_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(resp.status())
    }
}
