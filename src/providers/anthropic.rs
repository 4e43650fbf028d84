// Anthropic messages API backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::retry::with_retry;
use super::types::CompletionRequest;
use super::{status_error, ModelBackend};
use crate::errors::{ChillError, Result};

pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-opus-20240229";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 60;

pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl AnthropicBackend {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ChillError::BackendConfiguration(
                "ANTHROPIC_API_KEY is not set".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                ChillError::BackendConfiguration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key,
            url: DEFAULT_ANTHROPIC_URL.to_string(),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn complete_once(&self, request: &CompletionRequest) -> Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![MessagesTurn {
                role: "user",
                content: &request.prompt,
            }],
        };

        tracing::debug!("Sending request to Anthropic API ({})", self.model);

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error("anthropic", status, error_body));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            ChillError::Transport(format!("Failed to parse Anthropic response: {}", e))
        })?;

        let text = parsed.text();
        tracing::debug!("Received {} chars from Anthropic", text.len());
        Ok(text)
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        with_retry(|| self.complete_once(request)).await
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<MessagesTurn<'a>>,
}

#[derive(Debug, Serialize)]
struct MessagesTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::templates::CRITIQUE;

    #[test]
    fn test_missing_key_is_configuration_error() {
        assert!(matches!(
            AnthropicBackend::new("  ".into()),
            Err(ChillError::BackendConfiguration(_))
        ));
    }

    #[test]
    fn test_response_text_skips_non_text_blocks() {
        let parsed: MessagesResponse = serde_json::from_value(serde_json::json!({
            "content": [
                { "type": "text", "text": "{\"critique\":" },
                { "type": "thinking", "thinking": "hmm" },
                { "type": "text", "text": "\"ok\"}" }
            ]
        }))
        .unwrap();
        assert_eq!(parsed.text(), "{\"critique\":\n\"ok\"}");
    }

    #[tokio::test]
    async fn test_completion_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-test")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "id": "msg_1",
                    "type": "message",
                    "role": "assistant",
                    "content": [{ "type": "text", "text": "{\"critique\":\"calmer\"}" }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = AnthropicBackend::new("sk-test".into())
            .unwrap()
            .with_url(format!("{}/v1/messages", server.url()));
        let text = backend
            .complete(&CompletionRequest::new("critique this", CRITIQUE))
            .await
            .unwrap();

        assert_eq!(text, "{\"critique\":\"calmer\"}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_request_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(400)
            .with_body("{\"error\":\"prompt too long\"}")
            .expect(1)
            .create_async()
            .await;

        let backend = AnthropicBackend::new("sk-test".into())
            .unwrap()
            .with_url(format!("{}/v1/messages", server.url()));
        let err = backend
            .complete(&CompletionRequest::new("x", CRITIQUE))
            .await
            .unwrap_err();

        assert!(matches!(err, ChillError::Rejected { status: 400, .. }));
        mock.assert_async().await;
    }
}
