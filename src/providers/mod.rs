// Model backends
//
// Every backend answers one question: given a rendered prompt and the shape
// the answer should take, what text did the model produce? Parsing and
// validation happen one layer up in the structured client.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::errors::{ChillError, Result};

pub mod anthropic;
pub mod factory;
pub mod openai;
pub mod rate_limit;
pub mod retry;
pub mod runpod;
pub mod types;

pub use anthropic::AnthropicBackend;
pub use factory::create_backend;
pub use openai::OpenAiCompatBackend;
pub use rate_limit::RequestSpacer;
pub use runpod::RunpodBackend;
pub use types::CompletionRequest;

/// A model that turns a prompt into raw text.
///
/// Implementations are selected once at startup and shared behind an `Arc`
/// by every session; any throttling they need lives inside them.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Send the prompt and return the model's raw text answer.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Short backend tag recorded in call logs (e.g. "mistral", "runpod").
    fn name(&self) -> &str;

    /// Model identifier sent to the backend, if it takes one.
    fn model(&self) -> Option<&str> {
        None
    }
}

/// Map a non-success HTTP status to the error taxonomy.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: String) -> ChillError {
    match status.as_u16() {
        401 | 403 => ChillError::BackendConfiguration(format!(
            "{} rejected the credentials ({}): {}",
            provider, status, body
        )),
        429 => ChillError::RateLimited(format!("{}: {}", provider, body)),
        code if status.is_server_error() => {
            ChillError::Transport(format!("{} returned {}: {}", provider, code, body))
        }
        code => ChillError::Rejected { status: code, body },
    }
}
