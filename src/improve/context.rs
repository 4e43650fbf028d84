// Per-session state owned by the improvement loop

use std::cmp::Ordering;
use std::time::Duration;
use tokio::time::Instant;

use super::candidate::Candidate;

/// How many best candidates a session keeps.
pub const MAX_RETAINED: usize = 2;

/// Everything one improvement session knows. Created at loop start, mutated
/// only by the loop, dropped when the loop returns.
#[derive(Debug)]
pub struct RunContext {
    original_text: String,
    pub(crate) last_edit: String,
    request_count: u32,
    attempt_count: u32,
    start_time: Instant,
    suggestions: Vec<Candidate>,
}

impl RunContext {
    pub fn new(original_text: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            last_edit: String::new(),
            request_count: 0,
            attempt_count: 0,
            start_time: Instant::now(),
            suggestions: Vec::new(),
        }
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn last_edit(&self) -> &str {
        &self.last_edit
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn suggestions(&self) -> &[Candidate] {
        &self.suggestions
    }

    /// Count one logical model request and the backend attempts it took.
    pub(crate) fn record_request(&mut self, attempts: u32) {
        self.request_count += 1;
        self.attempt_count += attempts;
    }

    /// Append a candidate, keep the list sorted by overall score (descending)
    /// and drop everything past the top `MAX_RETAINED`.
    ///
    /// The sort is stable, so among equal scores the earlier candidate stays
    /// ahead.
    pub fn retain(&mut self, candidate: Candidate) {
        self.suggestions.push(candidate);
        self.suggestions.sort_by(|a, b| {
            b.overall_score()
                .partial_cmp(&a.overall_score())
                .unwrap_or(Ordering::Equal)
        });
        self.suggestions.truncate(MAX_RETAINED);
    }

    /// Take the retained candidates out, best first.
    pub(crate) fn into_suggestions(self) -> Vec<Candidate> {
        self.suggestions
    }
}
