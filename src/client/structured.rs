// Structured model client: render → dispatch → parse → validate → retry

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{ChillError, Result};
use crate::logging::{CallRecord, RecordLog};
use crate::prompts::{extract_json, render, PromptSpec, Replacements, StructuredValue};
use crate::providers::types::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::providers::{CompletionRequest, ModelBackend};

/// Attempts per logical request (first try plus retries) before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const STRICT_JSON_REMINDER: &str =
    "You must output the JSON in the required format only, with no remarks or prefacing remarks - JUST JSON!";

/// A validated answer and how many backend attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub value: StructuredValue,
    pub attempts: u32,
}

/// Sends prompts to one backend and only returns answers that match the
/// prompt's schema.
#[derive(Clone)]
pub struct StructuredClient {
    backend: Arc<dyn ModelBackend>,
    log: RecordLog,
    max_attempts: u32,
    call_timeout: Option<Duration>,
    max_tokens: u32,
    temperature: f32,
}

impl StructuredClient {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            log: RecordLog::disabled(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_log(mut self, log: RecordLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Render `spec` with `replacements` and fetch a schema-conforming answer.
    ///
    /// Malformed answers are re-requested with a strict-JSON reminder appended
    /// to the prompt, up to `max_attempts` attempts in total. Backend errors
    /// (transport, configuration, timeout) end the query immediately.
    pub async fn query(&self, spec: &PromptSpec, replacements: &Replacements) -> Result<QueryOutcome> {
        let rendered = render(spec.template, replacements);
        let mut prompt = rendered.clone();
        let mut last_reason = String::new();

        for attempt in 1..=self.max_attempts {
            let request = CompletionRequest::new(prompt.clone(), spec.schema)
                .with_max_tokens(self.max_tokens)
                .with_temperature(self.temperature);
            let record = CallRecord::new(self.backend.name(), spec.name, &prompt, attempt);

            let raw = match self.call_backend(&request).await {
                Ok(raw) => raw,
                Err(e) => {
                    self.log.record_call(&record.failed(None, e.to_string()));
                    return Err(e);
                }
            };

            match extract_json(&raw).and_then(|value| spec.schema.validate(value)) {
                Ok(value) => {
                    debug!("{} answered {} on attempt {}", self.backend.name(), spec.name, attempt);
                    self.log
                        .record_call(&record.succeeded(value.clone().into_value()));
                    return Ok(QueryOutcome {
                        value,
                        attempts: attempt,
                    });
                }
                Err(reason) => {
                    warn!(
                        "Invalid {} output (attempt {}/{}): {}",
                        spec.name, attempt, self.max_attempts, reason
                    );
                    self.log.record_call(&record.failed(Some(raw), reason.clone()));
                    last_reason = reason;

                    if attempt == 1 {
                        prompt = format!(
                            "{}\n{} The required keys are: {}.",
                            rendered,
                            STRICT_JSON_REMINDER,
                            spec.schema.key_list()
                        );
                    }
                }
            }
        }

        Err(ChillError::SchemaValidation {
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }

    async fn call_backend(&self, request: &CompletionRequest) -> Result<String> {
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, self.backend.complete(request))
                .await
                .map_err(|_| ChillError::Timeout {
                    seconds: limit.as_secs_f64(),
                })?,
            None => self.backend.complete(request).await,
        }
    }
}
