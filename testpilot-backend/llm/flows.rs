use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{LlmError, TextGenerator};
use crate::credentials::CredentialStore;

pub const DEFAULT_FLOW_COUNT: usize = 5;

/// One generated browser test: a short name, what it checks, and
/// conversational instructions for the browser agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlowSpec {
    pub name: String,
    pub description: String,
    pub instructions: String,
}

#[derive(thiserror::Error, Debug)]
pub enum FlowGenError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("empty response from model")]
    EmptyResponse,

    #[error("model returned invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("expected a JSON array of flows")]
    NotAnArray,

    #[error("no valid flows in model response")]
    NoValidFlows,
}

impl FlowGenError {
    /// Stable identifier for logs and error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowGenError::Llm(_) => "upstream",
            FlowGenError::EmptyResponse => "empty_response",
            FlowGenError::InvalidJson(_) => "invalid_json",
            FlowGenError::NotAnArray => "not_an_array",
            FlowGenError::NoValidFlows => "no_valid_flows",
        }
    }
}

pub fn build_prompt(
    user_prompt: &str,
    website_url: Option<&str>,
    num_flows: usize,
    credential_fields: &[String],
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are an expert QA automation engineer. Generate test flows as valid JSON.\n\n\
         You are a friendly QA expert helping create browser tests. Generate {num_flows} practical test flows.\n\n\
         USER REQUEST: {user_prompt}\n"
    );

    if let Some(url) = website_url {
        let _ = writeln!(prompt, "WEBSITE: {url}\n");
    }

    if !credential_fields.is_empty() {
        let placeholders: Vec<String> = credential_fields
            .iter()
            .map(|f| format!("{{{{credential.{f}}}}}"))
            .collect();
        let _ = writeln!(
            prompt,
            "The site has stored test credentials. When a flow needs to sign in, refer to them \
             only through these placeholders and never invent values: {}\n",
            placeholders.join(", ")
        );
    }

    let _ = write!(
        prompt,
        r#"Create {num_flows} different test scenarios that cover real user behavior and important functionality.

For each test flow, provide:
- name: Clear, descriptive test name (under 50 characters)
- description: What this test validates (under 100 characters)
- instructions: Conversational, natural instructions as if talking to a human assistant

Write instructions like you're giving directions to a helpful person:
- Use casual, friendly language
- Be specific but not overly technical
- Focus on user goals, not technical implementation
- Include what to look for and verify

Return ONLY valid JSON:
[
  {{
    "name": "User Login Flow",
    "description": "Verify login process and dashboard access",
    "instructions": "Please visit the homepage, find the sign in button and log in with valid credentials. Once you're in, check that the dashboard loads and shows the user's information."
  }}
]

Focus on realistic user journeys:
- Account access and authentication
- Core feature usage and navigation
- Form submissions and data entry
- Search, filtering, and content discovery
- Error handling and edge cases"#
    );

    prompt
}

/// Remove a leading ```` ```json ```` / ```` ``` ```` fence and a trailing ```` ``` ````.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut content = raw.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    content.trim()
}

fn as_flow(item: &Value) -> Option<FlowSpec> {
    let obj = item.as_object()?;
    let field = |key: &str| obj.get(key)?.as_str().map(String::from);
    Some(FlowSpec {
        name: field("name")?,
        description: field("description")?,
        instructions: field("instructions")?,
    })
}

/// Parse raw model output into flows, dropping malformed entries.
pub fn parse_flows(raw: &str) -> Result<Vec<FlowSpec>, FlowGenError> {
    if raw.trim().is_empty() {
        return Err(FlowGenError::EmptyResponse);
    }

    let content = strip_code_fences(raw);
    let parsed: Value = serde_json::from_str(content).map_err(FlowGenError::InvalidJson)?;
    let items = parsed.as_array().ok_or(FlowGenError::NotAnArray)?;

    let flows: Vec<FlowSpec> = items.iter().filter_map(as_flow).collect();
    if flows.len() < items.len() {
        tracing::debug!(
            dropped = items.len() - flows.len(),
            "dropped malformed flow entries"
        );
    }
    if flows.is_empty() {
        return Err(FlowGenError::NoValidFlows);
    }
    Ok(flows)
}

pub struct FlowGenerator {
    llm: Arc<dyn TextGenerator>,
    credentials: Arc<CredentialStore>,
}

impl FlowGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, credentials: Arc<CredentialStore>) -> Self {
        Self { llm, credentials }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        website_url: Option<&str>,
        num_flows: usize,
    ) -> Result<Vec<FlowSpec>, FlowGenError> {
        let credential_fields = website_url
            .map(|url| self.credentials.placeholders(url))
            .unwrap_or_default();

        let full_prompt = build_prompt(prompt, website_url, num_flows, &credential_fields);
        let raw = self.llm.generate(&full_prompt).await?;

        match parse_flows(&raw) {
            Ok(flows) => {
                tracing::info!(count = flows.len(), model = %self.llm.model(), "generated flows");
                Ok(flows)
            }
            Err(e) => {
                tracing::error!(kind = e.kind(), error = %e, raw = %raw, "flow generation failed");
                Err(e)
            }
        }
    }
}
