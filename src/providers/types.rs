// Backend-agnostic completion request

use crate::prompts::OutputSchema;

pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// One rendered prompt plus the shape its answer should take.
///
/// Backends that support constrained decoding turn `schema` into a grammar
/// or a response-format hint; the rest ignore it and rely on validation
/// after the fact.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub schema: OutputSchema,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, schema: OutputSchema) -> Self {
        Self {
            prompt: prompt.into(),
            schema,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}
