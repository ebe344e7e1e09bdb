//! Named browser sessions with an append-only action log.
//!
//! Actions are phrased as natural-language instructions and handed to a
//! [`BrowserAgent`]; the registry itself only tracks which sessions exist and
//! what happened in them.

pub mod agent;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;

pub use agent::{AgentOutcome, BrowserAgent};

const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 1280,
    height: 720,
};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("browser automation is not available: BROWSER_USE_API_KEY is not set")]
    AgentUnavailable,

    #[error("browser session {0} not found")]
    NotFound(String),

    #[error("browser session {0} already exists")]
    AlreadyExists(String),

    #[error("browser agent failed: {0}")]
    Agent(String),

    #[error("browser action timed out (task {0})")]
    Timeout(String),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub session_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub details: Value,
}

#[derive(Debug, Clone)]
struct BrowserSession {
    headless: bool,
    viewport: Viewport,
    created_at: DateTime<Utc>,
    current_url: Option<String>,
    last_output: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub session_id: String,
    pub action: String,
    pub status: String,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub status: String,
    pub total_actions: usize,
    pub last_action: Option<SessionLogEntry>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<String, BrowserSession>,
    // Outlives the session so logs stay readable after close.
    logs: HashMap<String, Vec<SessionLogEntry>>,
}

impl Registry {
    fn log(&mut self, session_id: &str, action: &str, error: Option<String>, details: Value) {
        let status = if error.is_some() { "error" } else { "success" };
        self.logs
            .entry(session_id.to_string())
            .or_default()
            .push(SessionLogEntry {
                timestamp: Utc::now(),
                action: action.to_string(),
                session_id: session_id.to_string(),
                status: status.to_string(),
                error,
                details,
            });
    }
}

fn with_page_context(url: &str, instruction: &str) -> String {
    format!("Open {url} and wait for the page to load. Then: {instruction}")
}

pub struct SessionManager {
    agent: Option<Arc<dyn BrowserAgent>>,
    registry: Mutex<Registry>,
}

impl SessionManager {
    pub fn new(agent: Option<Arc<dyn BrowserAgent>>) -> Self {
        Self {
            agent,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.agent.is_some()
    }

    fn agent(&self) -> Result<&Arc<dyn BrowserAgent>, SessionError> {
        self.agent.as_ref().ok_or(SessionError::AgentUnavailable)
    }

    pub async fn create(&self, session_id: &str, headless: bool) -> Result<ActionResult, SessionError> {
        self.agent()?;
        let mut registry = self.registry.lock().await;
        if registry.sessions.contains_key(session_id) {
            return Err(SessionError::AlreadyExists(session_id.to_string()));
        }

        registry.sessions.insert(
            session_id.to_string(),
            BrowserSession {
                headless,
                viewport: DEFAULT_VIEWPORT,
                created_at: Utc::now(),
                current_url: None,
                last_output: None,
            },
        );
        let details = json!({ "headless": headless, "viewport": DEFAULT_VIEWPORT });
        registry.logs.insert(session_id.to_string(), Vec::new());
        registry.log(session_id, "session_created", None, details.clone());

        tracing::info!(session_id, headless, "browser session created");
        Ok(ActionResult {
            session_id: session_id.to_string(),
            action: "create".to_string(),
            status: "created".to_string(),
            details,
        })
    }

    /// Run `instruction` for an existing session and record the result.
    ///
    /// Each agent run starts in a fresh browser, so page-level actions are
    /// prefixed with the session's current URL. The registry lock is not
    /// held while the agent works.
    async fn perform(
        &self,
        session_id: &str,
        action: &str,
        instruction: String,
        on_current_page: bool,
        mut details: Value,
    ) -> Result<ActionResult, SessionError> {
        let agent = self.agent()?.clone();
        let current_url = self
            .registry
            .lock()
            .await
            .sessions
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?
            .current_url
            .clone();

        let instruction = match current_url.filter(|_| on_current_page) {
            Some(url) => {
                let contextual = with_page_context(&url, &instruction);
                details["page_url"] = Value::String(url);
                contextual
            }
            None => instruction,
        };
        let result = agent.run(&instruction).await;

        let mut registry = self.registry.lock().await;
        match result {
            Ok(outcome) => {
                details["agent_task_id"] = json!(outcome.task_id);
                details["agent_result"] = outcome.output.clone().unwrap_or(Value::Null);
                if let Some(session) = registry.sessions.get_mut(session_id) {
                    session.last_output = outcome.output;
                }
                registry.log(session_id, action, None, details.clone());
                tracing::info!(session_id, action, "browser action succeeded");
                Ok(ActionResult {
                    session_id: session_id.to_string(),
                    action: action.to_string(),
                    status: "success".to_string(),
                    details,
                })
            }
            Err(e) => {
                let message = e.to_string();
                registry.log(session_id, action, Some(message.clone()), details);
                tracing::error!(session_id, action, error = %message, "browser action failed");
                Err(e)
            }
        }
    }

    pub async fn navigate(&self, session_id: &str, url: &str) -> Result<ActionResult, SessionError> {
        let result = self
            .perform(
                session_id,
                "navigate",
                format!("Navigate to {url} and wait for the page to load"),
                false,
                json!({ "target_url": url }),
            )
            .await?;

        if let Some(session) = self.registry.lock().await.sessions.get_mut(session_id) {
            session.current_url = Some(url.to_string());
        }
        Ok(result)
    }

    pub async fn click(&self, session_id: &str, selector: &str) -> Result<ActionResult, SessionError> {
        let result = self
            .perform(
                session_id,
                "click",
                format!("Click on the element with selector '{selector}'"),
                true,
                json!({ "selector": selector }),
            )
            .await?;
        Ok(result)
    }

    pub async fn type_text(
        &self,
        session_id: &str,
        selector: &str,
        text: &str,
    ) -> Result<ActionResult, SessionError> {
        let preview: String = if text.chars().count() > 50 {
            format!("{}...", text.chars().take(50).collect::<String>())
        } else {
            text.to_string()
        };
        let result = self
            .perform(
                session_id,
                "type",
                format!("Type the text '{text}' into the input field with selector '{selector}'"),
                true,
                json!({
                    "selector": selector,
                    "text_length": text.chars().count(),
                    "text_preview": preview,
                }),
            )
            .await?;
        Ok(result)
    }

    pub async fn page_info(&self, session_id: &str) -> Result<ActionResult, SessionError> {
        let mut registry = self.registry.lock().await;
        let session = registry
            .sessions
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let title = session
            .last_output
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let details = json!({
            "url": session.current_url.as_deref().unwrap_or("Unknown"),
            "title": title,
            "headless": session.headless,
            "viewport": session.viewport,
        });
        registry.log(session_id, "get_page_info", None, details.clone());

        Ok(ActionResult {
            session_id: session_id.to_string(),
            action: "get_page_info".to_string(),
            status: "success".to_string(),
            details,
        })
    }

    pub async fn status(&self, session_id: &str) -> SessionStatus {
        let registry = self.registry.lock().await;
        let Some(session) = registry.sessions.get(session_id) else {
            return SessionStatus {
                session_id: session_id.to_string(),
                status: "not_found".to_string(),
                total_actions: 0,
                last_action: None,
                created_at: None,
            };
        };

        let logs = registry.logs.get(session_id);
        SessionStatus {
            session_id: session_id.to_string(),
            status: "active".to_string(),
            total_actions: logs.map_or(0, Vec::len),
            last_action: logs.and_then(|l| l.last().cloned()),
            created_at: Some(session.created_at),
        }
    }

    pub async fn logs(&self, session_id: &str) -> Result<Vec<SessionLogEntry>, SessionError> {
        self.registry
            .lock()
            .await
            .logs
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub async fn close(&self, session_id: &str) -> Result<Value, SessionError> {
        let mut registry = self.registry.lock().await;
        if registry.sessions.remove(session_id).is_none() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        registry.log(session_id, "session_closed", None, Value::Null);
        let total_actions = registry.logs.get(session_id).map_or(0, Vec::len);

        tracing::info!(session_id, total_actions, "browser session closed");
        Ok(json!({
            "session_id": session_id,
            "status": "closed",
            "total_actions": total_actions,
        }))
    }

    pub async fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry.lock().await.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Create a throwaway session, open example.com, read page info, close it.
    pub async fn self_test(&self) -> Result<Value, SessionError> {
        let session_id = format!("test_session_{}", Utc::now().format("%Y%m%d_%H%M%S%3f"));
        let created = self.create(&session_id, true).await?;

        let checks = match self.navigate(&session_id, "https://example.com").await {
            Ok(_) => self.page_info(&session_id).await,
            Err(e) => Err(e),
        };

        let closed = self.close(&session_id).await?;
        let page_info = checks?;
        Ok(json!({
            "test": "basic_browser_functionality",
            "status": "success",
            "session_created": created,
            "page_info": page_info,
            "session_closed": closed,
        }))
    }
}
