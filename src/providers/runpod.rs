// RunPod serverless backend
//
// Sends `{input: {schema, prompt}}` to a worker's `runsync` endpoint. Jobs
// that outlive the synchronous window come back as IN_QUEUE/IN_PROGRESS with
// a job id and are polled on the status endpoint until they settle.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::retry::with_retry;
use super::types::CompletionRequest;
use super::{status_error, ModelBackend};
use crate::errors::{ChillError, Result};

pub const DEFAULT_RUNPOD_BASE_URL: &str = "https://api.runpod.ai";
const REQUEST_TIMEOUT_SECS: u64 = 120;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 300;

pub struct RunpodBackend {
    client: Client,
    api_key: String,
    endpoint_id: String,
    base_url: String,
}

impl RunpodBackend {
    pub fn new(endpoint_id: String, api_key: String) -> Result<Self> {
        if endpoint_id.trim().is_empty() {
            return Err(ChillError::BackendConfiguration(
                "RUNPOD_ENDPOINT_ID is not set".to_string(),
            ));
        }
        if api_key.trim().is_empty() {
            return Err(ChillError::BackendConfiguration(
                "RUNPOD_API_KEY is not set".to_string(),
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
            endpoint_id,
            base_url: DEFAULT_RUNPOD_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn runsync_url(&self) -> String {
        format!("{}/v2/{}/runsync", self.base_url, self.endpoint_id)
    }

    fn status_url(&self, job_id: &str) -> String {
        format!("{}/v2/{}/status/{}", self.base_url, self.endpoint_id, job_id)
    }

    /// Submit the job once the transport lets it through.
    ///
    /// Only this request is retried here; a job that was accepted is never
    /// sent again because a later status check failed.
    async fn submit(&self, request: &CompletionRequest) -> Result<JobResponse> {
        let body = RunRequest {
            input: RunInput {
                schema: request.schema.json_schema().to_string(),
                prompt: &request.prompt,
            },
        };

        let body = &body;
        tracing::debug!("Submitting job to RunPod endpoint {}", self.endpoint_id);

        with_retry(|| async move {
            let response = self
                .client
                .post(self.runsync_url())
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await?;
            self.read_job(response).await
        })
        .await
    }

    async fn poll(&self, job_id: &str) -> Result<JobResponse> {
        with_retry(|| async move {
            let response = self
                .client
                .get(self.status_url(job_id))
                .bearer_auth(&self.api_key)
                .send()
                .await?;
            self.read_job(response).await
        })
        .await
    }

    async fn run_job(&self, request: &CompletionRequest) -> Result<String> {
        let mut job = self.submit(request).await?;
        let mut polls = 0;
        while job.is_pending() {
            let Some(job_id) = job.id.clone() else {
                return Err(ChillError::Transport(
                    "RunPod job pending without an id".to_string(),
                ));
            };
            if polls >= MAX_POLLS {
                return Err(ChillError::Transport(format!(
                    "RunPod job {} still {} after {} polls",
                    job_id,
                    job.status.as_deref().unwrap_or("pending"),
                    polls
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            polls += 1;
            job = self.poll(&job_id).await?;
        }

        job.into_output()
    }

    async fn read_job(&self, response: reqwest::Response) -> Result<JobResponse> {
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error("runpod", status, error_body));
        }
        response
            .json()
            .await
            .map_err(|e| ChillError::Transport(format!("Failed to parse RunPod response: {}", e)))
    }
}

#[async_trait]
impl ModelBackend for RunpodBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.run_job(request).await
    }

    fn name(&self) -> &str {
        "runpod"
    }
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    input: RunInput<'a>,
}

#[derive(Debug, Serialize)]
struct RunInput<'a> {
    schema: String,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    id: Option<String>,
    status: Option<String>,
    output: Option<Value>,
    error: Option<String>,
}

impl JobResponse {
    fn is_pending(&self) -> bool {
        matches!(self.status.as_deref(), Some("IN_QUEUE") | Some("IN_PROGRESS"))
    }

    fn into_output(self) -> Result<String> {
        if let Some(error) = self.error {
            return Err(ChillError::Transport(format!("RunPod job failed: {}", error)));
        }
        match self.output {
            Some(Value::String(text)) => Ok(strip_model_banner(&text).to_string()),
            Some(Value::Null) | None => Err(ChillError::Transport(format!(
                "RunPod job finished with status {} and no output",
                self.status.as_deref().unwrap_or("unknown")
            ))),
            Some(other) => Ok(other.to_string()),
        }
    }
}

/// Workers prefix their output with a `model:<file>` line; drop it.
fn strip_model_banner(output: &str) -> &str {
    match output.split_once('\n') {
        Some((first, rest)) if first.trim_start().starts_with("model:") => rest,
        _ => output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::templates::FAITHFULNESS_SCORE;

    #[test]
    fn test_missing_credentials() {
        assert!(matches!(
            RunpodBackend::new(String::new(), "key".into()),
            Err(ChillError::BackendConfiguration(_))
        ));
        assert!(matches!(
            RunpodBackend::new("endpoint".into(), String::new()),
            Err(ChillError::BackendConfiguration(_))
        ));
    }

    #[test]
    fn test_strip_model_banner() {
        assert_eq!(
            strip_model_banner("model:mixtral-8x7b-instruct-v0.1.Q4_K_M.gguf\n{\"a\":1}"),
            "{\"a\":1}"
        );
        assert_eq!(strip_model_banner("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_model_banner("{\"a\":\n1}"), "{\"a\":\n1}");
    }

    #[test]
    fn test_object_output_is_reserialized() {
        let job = JobResponse {
            id: None,
            status: Some("COMPLETED".into()),
            output: Some(serde_json::json!({ "faithfulness_score": 0.8 })),
            error: None,
        };
        assert_eq!(job.into_output().unwrap(), "{\"faithfulness_score\":0.8}");
    }

    #[tokio::test]
    async fn test_runsync_completed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/ep123/runsync")
            .match_header("authorization", "Bearer rp-key")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "id": "job-1",
                    "status": "COMPLETED",
                    "output": "model:phi-2.gguf\n{\"faithfulness_score\": 0.9}"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = RunpodBackend::new("ep123".into(), "rp-key".into())
            .unwrap()
            .with_base_url(server.url());
        let text = backend
            .complete(&CompletionRequest::new("score", FAITHFULNESS_SCORE))
            .await
            .unwrap();

        assert_eq!(text, "{\"faithfulness_score\": 0.9}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pending_job_is_polled() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/v2/ep123/runsync")
            .with_status(200)
            .with_body(r#"{"id":"job-7","status":"IN_QUEUE"}"#)
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/v2/ep123/status/job-7")
            .with_status(200)
            .with_body(r#"{"id":"job-7","status":"COMPLETED","output":"{\"faithfulness_score\":0.5}"}"#)
            .create_async()
            .await;

        let backend = RunpodBackend::new("ep123".into(), "rp-key".into())
            .unwrap()
            .with_base_url(server.url());
        let text = backend
            .complete(&CompletionRequest::new("score", FAITHFULNESS_SCORE))
            .await
            .unwrap();

        assert_eq!(text, "{\"faithfulness_score\":0.5}");
        submit.assert_async().await;
        poll.assert_async().await;
    }

    #[tokio::test]
    async fn test_failing_status_check_does_not_resubmit() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/v2/ep123/runsync")
            .with_status(200)
            .with_body(r#"{"id":"job-7","status":"IN_QUEUE"}"#)
            .expect(1)
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/v2/ep123/status/job-7")
            .with_status(503)
            .with_body("worker unavailable")
            .expect(3)
            .create_async()
            .await;

        let backend = RunpodBackend::new("ep123".into(), "rp-key".into())
            .unwrap()
            .with_base_url(server.url());
        let err = backend
            .complete(&CompletionRequest::new("score", FAITHFULNESS_SCORE))
            .await
            .unwrap_err();

        assert!(matches!(err, ChillError::Transport(_)));
        submit.assert_async().await;
        poll.assert_async().await;
    }
}
