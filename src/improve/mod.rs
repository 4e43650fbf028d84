// Improvement loop
//
// Proposes a calmer rewrite, critiques and scores it, and decides whether to
// try again, under an iteration and time budget.

mod candidate;
mod context;
mod loop_runner;
mod types;

pub use candidate::{Candidate, RewriteVariants};
pub use context::{RunContext, MAX_RETAINED};
pub use loop_runner::{decide, ImprovementLoop};
pub use types::{Decision, ImproveStyle, ImprovementResult, LoopConfig, StopReason};
