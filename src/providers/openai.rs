// OpenAI-compatible chat completion backend
//
// Covers two deployments that speak the same `/v1/chat/completions` dialect:
// a llama.cpp-style inference server (streamed, grammar-constrained) and the
// hosted Mistral API (JSON response format, spaced requests).

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::rate_limit::RequestSpacer;
use super::retry::with_retry;
use super::types::CompletionRequest;
use super::{status_error, ModelBackend};
use crate::errors::{ChillError, Result};

const REQUEST_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_LLAMA_SERVER_URL: &str = "http://localhost:5834/v1/chat/completions";
pub const DEFAULT_MISTRAL_URL: &str = "https://api.mistral.ai/v1/chat/completions";
pub const DEFAULT_MISTRAL_MODEL: &str = "mistral-small-latest";

/// Minimum spacing between Mistral API requests.
pub const MISTRAL_REQUEST_INTERVAL: Duration = Duration::from_millis(500);

/// How the schema is communicated to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Constraint {
    /// llama.cpp `grammar` field with a GBNF grammar; response is streamed.
    Grammar,
    /// `response_format: {"type": "json_object"}`; response is not streamed.
    JsonObject,
}

pub struct OpenAiCompatBackend {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: Option<String>,
    provider_name: String,
    constraint: Constraint,
    spacer: Option<RequestSpacer>,
}

impl OpenAiCompatBackend {
    /// Self-hosted llama.cpp-compatible server (no auth, streamed, grammar).
    pub fn llama_server(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            url: url.into(),
            api_key: None,
            model: None,
            provider_name: "http".to_string(),
            constraint: Constraint::Grammar,
            spacer: None,
        })
    }

    /// Hosted Mistral API.
    pub fn mistral(api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ChillError::BackendConfiguration(
                "MISTRAL_API_KEY is not set".to_string(),
            ));
        }
        Ok(Self {
            client: build_client()?,
            url: DEFAULT_MISTRAL_URL.to_string(),
            api_key: Some(api_key),
            model: Some(DEFAULT_MISTRAL_MODEL.to_string()),
            provider_name: "mistral".to_string(),
            constraint: Constraint::JsonObject,
            spacer: Some(RequestSpacer::new(MISTRAL_REQUEST_INTERVAL)),
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override (or disable) request spacing.
    pub fn with_request_interval(mut self, interval: Option<Duration>) -> Self {
        self.spacer = interval.map(RequestSpacer::new);
        self
    }

    fn to_chat_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        let (stream, grammar, response_format) = match self.constraint {
            Constraint::Grammar => (true, Some(request.schema.to_gbnf()), None),
            Constraint::JsonObject => (
                false,
                None,
                Some(ResponseFormat {
                    format_type: "json_object",
                }),
            ),
        };

        ChatRequest {
            model: self.model.as_deref(),
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
            grammar,
            response_format,
        }
    }

    async fn complete_once(&self, request: &CompletionRequest) -> Result<String> {
        if let Some(spacer) = &self.spacer {
            spacer.wait().await;
        }

        let body = self.to_chat_request(request);
        tracing::debug!("Sending request to {} ({} chars)", self.url, request.prompt.len());

        let mut builder = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("accept", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(&self.provider_name, status, error_body));
        }

        if body.stream {
            read_event_stream(response).await
        } else {
            let parsed: ChatResponse = response.json().await.map_err(|e| {
                ChillError::Transport(format!("Failed to parse {} response: {}", self.provider_name, e))
            })?;
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| {
                    ChillError::Transport(format!("{} returned no choices", self.provider_name))
                })
        }
    }
}

#[async_trait]
impl ModelBackend for OpenAiCompatBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        with_retry(|| self.complete_once(request)).await
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| ChillError::BackendConfiguration(format!("Failed to create HTTP client: {}", e)))
}

/// Drain a server-sent event stream into the concatenated content deltas.
async fn read_event_stream(response: reqwest::Response) -> Result<String> {
    let mut stream = response.bytes_stream();
    let mut events = EventStreamText::default();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        if events.push(&bytes) {
            break;
        }
    }
    events.finish();

    tracing::debug!("[STREAM] received {} chars", events.text.len());
    Ok(events.text)
}

/// Incremental parser for `data: {...}` lines terminated by `data: [DONE]`.
#[derive(Debug, Default)]
pub(crate) struct EventStreamText {
    buffer: Vec<u8>,
    pub(crate) text: String,
    pub(crate) done: bool,
}

impl EventStreamText {
    /// Feed raw bytes; returns true once the `[DONE]` sentinel was seen.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> bool {
        self.buffer.extend_from_slice(bytes);

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            self.handle_line(&line);
            if self.done {
                break;
            }
        }
        self.done
    }

    /// Handle a trailing line that arrived without a newline.
    pub(crate) fn finish(&mut self) {
        if !self.done && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.handle_line(&line);
        }
    }

    fn handle_line(&mut self, line: &str) {
        let Some(payload) = line.trim().strip_prefix("data:") else {
            return;
        };
        let payload = payload.trim();

        if payload == "[DONE]" {
            self.done = true;
            return;
        }

        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => {
                if let Some(content) = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                {
                    self.text.push_str(&content);
                }
            }
            Err(e) => tracing::debug!("Skipping unparseable stream event: {}", e),
        }
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    grammar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::templates::SPICY_SCORE;

    fn delta(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }

    #[test]
    fn test_event_stream_concatenates_deltas() {
        let mut events = EventStreamText::default();
        assert!(!events.push(delta("{\"spicy").as_bytes()));
        assert!(!events.push(delta("_score\": 0.1}").as_bytes()));
        assert!(events.push(b"data: [DONE]\n\n"));
        assert_eq!(events.text, "{\"spicy_score\": 0.1}");
    }

    #[test]
    fn test_event_stream_handles_split_lines() {
        let payload = delta("hello");
        let (a, b) = payload.as_bytes().split_at(10);
        let mut events = EventStreamText::default();
        events.push(a);
        assert_eq!(events.text, "");
        events.push(b);
        assert_eq!(events.text, "hello");
    }

    #[test]
    fn test_event_stream_ignores_after_done() {
        let mut events = EventStreamText::default();
        let mut bytes = delta("a").into_bytes();
        bytes.extend_from_slice(b"data: [DONE]\n");
        bytes.extend_from_slice(delta("b").as_bytes());
        assert!(events.push(&bytes));
        assert_eq!(events.text, "a");
    }

    #[test]
    fn test_event_stream_role_only_delta() {
        let mut events = EventStreamText::default();
        events.push(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n");
        events.push(b": keep-alive\n");
        events.finish();
        assert_eq!(events.text, "");
        assert!(!events.done);
    }

    #[test]
    fn test_mistral_requires_key() {
        assert!(matches!(
            OpenAiCompatBackend::mistral(String::new()),
            Err(ChillError::BackendConfiguration(_))
        ));
    }

    #[test]
    fn test_llama_request_carries_grammar_and_streams() {
        let backend = OpenAiCompatBackend::llama_server(DEFAULT_LLAMA_SERVER_URL).unwrap();
        let request = CompletionRequest::new("score it", SPICY_SCORE);
        let body = serde_json::to_value(backend.to_chat_request(&request)).unwrap();
        assert_eq!(body["stream"], true);
        assert!(body["grammar"].as_str().unwrap().contains("spicy_score"));
        assert!(body.get("response_format").is_none());
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_mistral_request_uses_json_format() {
        let backend = OpenAiCompatBackend::mistral("key".into()).unwrap();
        let request = CompletionRequest::new("score it", SPICY_SCORE);
        let body = serde_json::to_value(backend.to_chat_request(&request)).unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["model"], DEFAULT_MISTRAL_MODEL);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("grammar").is_none());
    }

    #[tokio::test]
    async fn test_llama_server_streamed_completion() {
        let mut server = mockito::Server::new_async().await;
        let body = format!("{}{}data: [DONE]\n\n", delta("{\"critique\":"), delta("\"fine\"}"));
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let backend =
            OpenAiCompatBackend::llama_server(format!("{}/v1/chat/completions", server.url()))
                .unwrap();
        let text = backend
            .complete(&CompletionRequest::new("critique", SPICY_SCORE))
            .await
            .unwrap();

        assert_eq!(text, "{\"critique\":\"fine\"}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_mistral_completion_with_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": "{\"spicy_score\":0.2}" } }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = OpenAiCompatBackend::mistral("secret".into())
            .unwrap()
            .with_url(format!("{}/v1/chat/completions", server.url()))
            .with_request_interval(None);
        let text = backend
            .complete(&CompletionRequest::new("score", SPICY_SCORE))
            .await
            .unwrap();

        assert_eq!(text, "{\"spicy_score\":0.2}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_configuration_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body("invalid key")
            .expect(1)
            .create_async()
            .await;

        let backend = OpenAiCompatBackend::mistral("wrong".into())
            .unwrap()
            .with_url(format!("{}/v1/chat/completions", server.url()))
            .with_request_interval(None);
        let err = backend
            .complete(&CompletionRequest::new("score", SPICY_SCORE))
            .await
            .unwrap_err();

        assert!(matches!(err, ChillError::BackendConfiguration(_)));
        mock.assert_async().await;
    }
}
