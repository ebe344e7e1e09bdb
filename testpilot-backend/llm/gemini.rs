use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{LlmError, TextGenerator};

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate; empty when there is none.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        Ok(parsed.text())
    }

    async fn probe(&self) -> Result<(), LlmError> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let resp = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::Server) -> GeminiClient {
        GeminiClient::new(Client::new(), server.url(), "gemini-test", "g-key")
    }

    #[tokio::test]
    async fn generate_returns_first_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-test:generateContent")
            .match_header("x-goog-api-key", "g-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"[{\"a\":"},{"text":"1}]"}]}},{"content":{"parts":[{"text":"ignored"}]}}]}"#,
            )
            .create_async()
            .await;

        let text = client_for(&server).generate("hello").await.unwrap();
        assert_eq!(text, r#"[{"a":1}]"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_without_candidates_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/gemini-test:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        assert_eq!(client_for(&server).generate("hello").await.unwrap(), "");
    }

    #[tokio::test]
    async fn generate_error_status_is_upstream() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/gemini-test:generateContent")
            .with_status(403)
            .with_body("API key not valid")
            .create_async()
            .await;

        let err = client_for(&server).generate("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Upstream { status: 403, .. }));
    }

    #[tokio::test]
    async fn probe_hits_model_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/models/gemini-test")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        client_for(&server).probe().await.unwrap();
        mock.assert_async().await;
    }
}
