pub mod flows;
pub mod gemini;

use async_trait::async_trait;

/// A single-shot text completion backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier, reported in health checks and logs.
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Cheap authenticated call used by the health checker.
    async fn probe(&self) -> Result<(), LlmError>;
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("Gemini returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected Gemini response shape: {0}")]
    Decode(String),
}
