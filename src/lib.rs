// Chill - iterative calm-rewrite engine
// Library exports

pub mod client;
pub mod config;
pub mod errors;
pub mod improve;
pub mod logging;
pub mod prompts;
pub mod providers;
pub mod scoring;

pub use client::StructuredClient;
pub use errors::{ChillError, Result};
pub use improve::{ImprovementLoop, ImprovementResult, LoopConfig};
