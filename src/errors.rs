// Error taxonomy for the rewrite engine
//
// Library code returns `ChillError`; the binary and config loader wrap it in
// anyhow with context.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChillError>;

#[derive(Debug, Error)]
pub enum ChillError {
    /// Model output never parsed into the declared schema.
    #[error("model output failed schema validation after {attempts} attempt(s): {reason}")]
    SchemaValidation { attempts: u32, reason: String },

    /// Credentials or endpoint missing for the selected backend. Not retried.
    #[error("backend configuration error: {0}")]
    BackendConfiguration(String),

    /// Network failure or a non-success status from the backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered 429.
    #[error("rate limited by backend: {0}")]
    RateLimited(String),

    /// The backend refused the request outright (4xx other than auth/429).
    #[error("backend rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("model call timed out after {seconds:.1}s")]
    Timeout { seconds: f64 },

    /// Prompt inputs could not be JSON-encoded.
    #[error("failed to encode prompt input: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("invalid improvement config: {0}")]
    InvalidConfig(String),

    /// The loop finished without retaining a single candidate.
    #[error("improvement loop finished with no retained candidates")]
    EmptyResult,
}

impl ChillError {
    /// True for failures worth re-sending the same request for.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChillError::Transport(_) | ChillError::RateLimited(_))
    }
}

impl From<reqwest::Error> for ChillError {
    fn from(err: reqwest::Error) -> Self {
        ChillError::Transport(err.to_string())
    }
}
