// Structured model client
//
// The one place that knows how to turn a prompt + schema into a validated
// value, whatever backend sits underneath.

pub mod structured;

pub use structured::{QueryOutcome, StructuredClient, DEFAULT_MAX_ATTEMPTS};
