use axum::Json;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use hyper::StatusCode;
use serde_json::{Map, Value, json};

use crate::browser_cloud::CloudError;
use crate::browser_cloud::batch::BatchError;
use crate::convex::ConvexError;
use crate::credentials::CredentialError;
use crate::llm::flows::FlowGenError;
use crate::sessions::SessionError;

pub(crate) type ApiResult = Result<Json<Value>, ApiError>;

/// Error rendered as `{"status":"error","message":...,"timestamp":...}`,
/// merged with any extra fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub extra: Map<String, Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            extra: Map::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = self.extra;
        body.insert("status".into(), json!("error"));
        body.insert("message".into(), json!(self.message));
        body.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
        (self.status, Json(Value::Object(body))).into_response()
    }
}

/// Tag an object body with `"status": "success"` and a timestamp.
pub(crate) fn success(body: Value) -> Json<Value> {
    let mut map = match body {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".into(), other);
            map
        }
    };
    map.entry("status").or_insert_with(|| json!("success"));
    map.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
    Json(Value::Object(map))
}

impl From<CloudError> for ApiError {
    fn from(e: CloudError) -> Self {
        let status = match &e {
            CloudError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            CloudError::NotFound(_) => StatusCode::NOT_FOUND,
            CloudError::Invalid(_) => StatusCode::BAD_REQUEST,
            CloudError::Upstream { .. } | CloudError::Http(_) | CloudError::Decode(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<BatchError> for ApiError {
    fn from(e: BatchError) -> Self {
        let message = e.to_string();
        let created = json!(e.created);
        let mut err = ApiError::from(e.source);
        err.message = message;
        err.with("created_task_ids", created)
    }
}

impl From<FlowGenError> for ApiError {
    fn from(e: FlowGenError) -> Self {
        let status = match &e {
            FlowGenError::Llm(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        ApiError::new(status, format!("Flow generation failed: {e}")).with("kind", json!(e.kind()))
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::NotFound(_) => ApiError::not_found(e.to_string()),
            CredentialError::InvalidDomain(_) => ApiError::bad_request(e.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        let status = match &e {
            SessionError::AgentUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::AlreadyExists(_) => StatusCode::CONFLICT,
            SessionError::Agent(_) => StatusCode::BAD_GATEWAY,
            SessionError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<ConvexError> for ApiError {
    fn from(e: ConvexError) -> Self {
        let status = match &e {
            ConvexError::NotConfigured | ConvexError::Http(_) => StatusCode::SERVICE_UNAVAILABLE,
            ConvexError::Function(_) => StatusCode::BAD_REQUEST,
            ConvexError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        };
        ApiError::new(status, e.to_string())
    }
}
