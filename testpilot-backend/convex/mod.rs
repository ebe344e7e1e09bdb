pub mod samples;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(thiserror::Error, Debug)]
pub enum ConvexError {
    #[error("Convex deployment URL not configured")]
    NotConfigured,

    #[error("database connection failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Convex returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Convex function error: {0}")]
    Function(String),
}

/// Calls Convex functions by path (`"table:function"`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn call(&self, function: &str, args: Value) -> Result<Value, ConvexError>;
    async fn probe(&self) -> Result<StatusCode, ConvexError>;
    fn deployment_url(&self) -> &str;
}

pub struct ConvexClient {
    client: Client,
    deployment_url: String,
}

#[derive(Deserialize)]
struct FunctionResponse {
    #[serde(default)]
    value: Option<Value>,
    #[serde(default, alias = "errorMessage")]
    error: Option<Value>,
}

/// Writes go through `/api/mutation`, everything else through `/api/query`.
pub fn endpoint_for(function: &str) -> &'static str {
    let name = function.rsplit(':').next().unwrap_or(function);
    if ["create", "update", "remove"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
    {
        "/api/mutation"
    } else {
        "/api/query"
    }
}

impl ConvexClient {
    pub fn new(client: Client, deployment_url: impl Into<String>) -> Self {
        Self {
            client,
            deployment_url: deployment_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for ConvexClient {
    async fn call(&self, function: &str, args: Value) -> Result<Value, ConvexError> {
        let url = format!("{}{}", self.deployment_url, endpoint_for(function));
        let args = match args {
            Value::Null => json!([]),
            Value::Object(ref m) if m.is_empty() => json!([]),
            other => json!([other]),
        };

        let resp = self
            .client
            .post(&url)
            .json(&json!({ "path": function, "args": args, "format": "json" }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConvexError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: FunctionResponse = resp.json().await?;
        if let Some(error) = parsed.error.filter(|e| !e.is_null()) {
            let message = error.as_str().map(String::from).unwrap_or_else(|| error.to_string());
            tracing::warn!(function, error = %message, "Convex function returned an error");
            return Err(ConvexError::Function(message));
        }
        Ok(parsed.value.unwrap_or(Value::Null))
    }

    async fn probe(&self) -> Result<StatusCode, ConvexError> {
        let resp = self.client.get(&self.deployment_url).send().await?;
        Ok(resp.status())
    }

    fn deployment_url(&self) -> &str {
        &self.deployment_url
    }
}
