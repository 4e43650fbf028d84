// Improvement loop configuration and results

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::candidate::Candidate;
use crate::errors::{ChillError, Result};
use crate::prompts::{PromptSpec, IMPROVE_SIMPLE, IMPROVE_VARIANTS};

/// Which improve prompt the loop proposes edits with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImproveStyle {
    /// Worst terms plus worst-fix / NVC / constructive variants; rewrite in `best`.
    #[default]
    Variants,
    /// A single `text` rewrite.
    Simple,
}

impl ImproveStyle {
    pub fn prompt(self) -> PromptSpec {
        match self {
            ImproveStyle::Variants => IMPROVE_VARIANTS,
            ImproveStyle::Simple => IMPROVE_SIMPLE,
        }
    }
}

impl std::str::FromStr for ImproveStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "variants" => Ok(ImproveStyle::Variants),
            "simple" => Ok(ImproveStyle::Simple),
            other => Err(format!("unknown improve style '{}' (expected variants|simple)", other)),
        }
    }
}

/// Budget and thresholds for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub max_iterations: u32,
    pub min_iterations: u32,
    pub good_score: f64,
    pub good_score_if_late: f64,
    pub deadline_seconds: f64,
    /// Upper bound on a single model call; `None` waits indefinitely.
    pub call_timeout_seconds: Option<f64>,
    /// Total attempts per logical request before a schema failure is fatal.
    pub max_attempts: u32,
    pub style: ImproveStyle,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            min_iterations: 2,
            good_score: 0.85,
            good_score_if_late: 0.70,
            deadline_seconds: 60.0,
            call_timeout_seconds: None,
            max_attempts: crate::client::DEFAULT_MAX_ATTEMPTS,
            style: ImproveStyle::Variants,
        }
    }
}

impl LoopConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs_f64(self.deadline_seconds)
    }

    /// Per-call limit; values `validate` would reject yield `None`.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_seconds
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(ChillError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ChillError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.deadline_seconds.is_finite() || self.deadline_seconds < 0.0 {
            return Err(ChillError::InvalidConfig(format!(
                "deadline_seconds must be a non-negative number, got {}",
                self.deadline_seconds
            )));
        }
        if let Some(timeout) = self.call_timeout_seconds {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(ChillError::InvalidConfig(format!(
                    "call_timeout_seconds must be positive, got {}",
                    timeout
                )));
            }
        }
        if self.min_iterations > self.max_iterations {
            tracing::warn!(
                "min_iterations ({}) exceeds max_iterations ({}); only the iteration cap or deadline can stop early",
                self.min_iterations,
                self.max_iterations
            );
        }
        Ok(())
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Reached `good_score` after at least `min_iterations`.
    GoodAttempt,
    /// Past the deadline with a score of at least `good_score_if_late`.
    DeadlineReached,
    /// Ran `max_iterations` iterations.
    IterationCap,
}

/// Outcome of the Deciding step for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Stop(StopReason),
}

/// The best candidate plus run metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImprovementResult {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub input: String,
    pub iteration_count: u32,
    pub max_allowed_iterations: u32,
    /// Seconds from session start to the final decision.
    pub time_used: f64,
    /// Logical model requests issued over the whole session.
    pub total_request_count: u32,
    /// Backend attempts, including schema retries.
    pub attempt_count: u32,
    pub stop_reason: StopReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoopConfig::default();
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.min_iterations, 2);
        assert_eq!(config.good_score, 0.85);
        assert_eq!(config.good_score_if_late, 0.70);
        assert_eq!(config.deadline(), Duration::from_secs(60));
        assert_eq!(config.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let config = LoopConfig {
            max_iterations: 0,
            ..LoopConfig::default()
        };
        assert!(matches!(config.validate(), Err(ChillError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let config = LoopConfig {
            call_timeout_seconds: Some(0.0),
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: LoopConfig = toml::from_str("max_iterations = 5\nstyle = \"simple\"").unwrap();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.min_iterations, 2);
        assert_eq!(config.style, ImproveStyle::Simple);
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("simple".parse::<ImproveStyle>().unwrap(), ImproveStyle::Simple);
        assert_eq!("variants".parse::<ImproveStyle>().unwrap(), ImproveStyle::Variants);
        assert!("fancy".parse::<ImproveStyle>().is_err());
        assert_eq!(ImproveStyle::Simple.prompt().rewrite_field, Some("text"));
        assert_eq!(ImproveStyle::Variants.prompt().rewrite_field, Some("best"));
    }
}
