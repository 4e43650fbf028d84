// Improvement loop runner: propose → critique + score → decide

use std::time::Duration;
use tracing::{debug, info, warn};

use super::candidate::{Candidate, RewriteVariants};
use super::context::RunContext;
use super::types::{Decision, ImprovementResult, LoopConfig, StopReason};
use crate::client::StructuredClient;
use crate::errors::{ChillError, Result};
use crate::logging::{RecordLog, SessionRecord};
use crate::prompts::{
    replacements, PromptSpec, CRITIQUE_PROMPT, FAITHFULNESS_PROMPT, SPICY_PROMPT,
};

/// The improvement loop.
///
/// Each iteration proposes a rewrite, critiques and scores it with three
/// concurrent model calls, retains the best two candidates, and stops when:
/// - the score reaches `good_score` after `min_iterations` iterations
/// - the deadline has passed and the score is at least `good_score_if_late`
/// - `max_iterations` iterations have run
///
/// The loop holds no session state itself, so one instance can serve many
/// sessions concurrently.
pub struct ImprovementLoop {
    client: StructuredClient,
    config: LoopConfig,
    log: RecordLog,
}

impl ImprovementLoop {
    /// `config.max_attempts` and `config.call_timeout_seconds` override
    /// whatever `client` was built with.
    pub fn new(client: StructuredClient, config: LoopConfig) -> Self {
        let client = client
            .with_max_attempts(config.max_attempts)
            .with_call_timeout(config.call_timeout());
        Self {
            client,
            config,
            log: RecordLog::disabled(),
        }
    }

    /// Record each finished session to `log`.
    pub fn with_log(mut self, log: RecordLog) -> Self {
        self.log = log;
        self
    }

    /// Run one session over `input` and return the best candidate found.
    ///
    /// Any model error ends the session; the retained candidates are dropped.
    pub async fn run(&self, input: &str) -> Result<ImprovementResult> {
        self.config.validate()?;

        let improve = self.config.style.prompt();
        let mut ctx = RunContext::new(input);
        let mut iteration = 1;
        let mut elapsed;

        let stop_reason = loop {
            let variants = self.propose(&mut ctx, &improve).await?;
            let candidate = self.critique(&mut ctx).await?.with_variants(variants);
            let overall = candidate.overall_score();
            ctx.retain(candidate);

            elapsed = ctx.elapsed();
            info!(
                "Iteration {}: overall_score={:.2}, time_used={:.2}s",
                iteration,
                overall,
                elapsed.as_secs_f64()
            );
            debug!("Retained suggestions: {:?}", ctx.suggestions());

            if let Decision::Stop(reason) = decide(iteration, overall, elapsed, &self.config) {
                break reason;
            }
            iteration += 1;
        };

        let request_count = ctx.request_count();
        let attempt_count = ctx.attempt_count();
        let best = ctx
            .into_suggestions()
            .into_iter()
            .next()
            .ok_or(ChillError::EmptyResult)?;

        info!(
            "Stopping after {} iteration(s) ({:?}): overall_score={:.2}",
            iteration,
            stop_reason,
            best.overall_score()
        );

        let result = ImprovementResult {
            candidate: best,
            input: input.to_string(),
            iteration_count: iteration,
            max_allowed_iterations: self.config.max_iterations,
            time_used: elapsed.as_secs_f64(),
            total_request_count: request_count,
            attempt_count,
            stop_reason,
        };
        self.record(&result);
        Ok(result)
    }

    /// Ask for a rewrite of the original, showing the model what it has
    /// already tried. Sets `last_edit`.
    async fn propose(
        &self,
        ctx: &mut RunContext,
        spec: &PromptSpec,
    ) -> Result<Option<RewriteVariants>> {
        let inputs = replacements([
            ("original_text", serde_json::to_string(ctx.original_text())?),
            (
                "previous_suggestions",
                serde_json::to_string_pretty(ctx.suggestions())?,
            ),
        ]);

        let outcome = self.client.query(spec, &inputs).await?;
        ctx.record_request(outcome.attempts);

        let edit = spec
            .rewrite_field
            .and_then(|field| outcome.value.str_field(field))
            .ok_or_else(|| ChillError::SchemaValidation {
                attempts: outcome.attempts,
                reason: format!("{} answer has no rewrite field", spec.name),
            })?;
        ctx.last_edit = edit.to_string();

        Ok(RewriteVariants::from_improvement(&outcome.value))
    }

    /// Critique and score `last_edit` against the original.
    async fn critique(&self, ctx: &mut RunContext) -> Result<Candidate> {
        let inputs = replacements([
            ("original_text", ctx.original_text()),
            ("last_edit", ctx.last_edit()),
        ]);

        let (critique, faithfulness, spicy) = tokio::try_join!(
            self.client.query(&CRITIQUE_PROMPT, &inputs),
            self.client.query(&FAITHFULNESS_PROMPT, &inputs),
            self.client.query(&SPICY_PROMPT, &inputs),
        )?;
        ctx.record_request(critique.attempts);
        ctx.record_request(faithfulness.attempts);
        ctx.record_request(spicy.attempts);

        // Presence and types were checked by schema validation.
        let critique_text = critique.value.str_field("critique").unwrap_or_default();
        let faithfulness_score = faithfulness
            .value
            .f64_field("faithfulness_score")
            .unwrap_or_default();
        let spicy_score = spicy.value.f64_field("spicy_score").unwrap_or_default();

        Ok(Candidate::new(
            ctx.last_edit(),
            critique_text,
            faithfulness_score,
            spicy_score,
            ctx.request_count(),
        ))
    }

    fn record(&self, result: &ImprovementResult) {
        match serde_json::to_value(result) {
            Ok(output) => self
                .log
                .record_session(&SessionRecord::new(&result.input, output)),
            Err(e) => warn!("Failed to serialize session result: {}", e),
        }
    }
}

/// The Deciding step: stop or go round again after `iteration` scored
/// `overall` at `elapsed` into the session.
pub fn decide(iteration: u32, overall: f64, elapsed: Duration, config: &LoopConfig) -> Decision {
    if iteration >= config.min_iterations && overall >= config.good_score {
        Decision::Stop(StopReason::GoodAttempt)
    } else if elapsed > config.deadline() && overall >= config.good_score_if_late {
        Decision::Stop(StopReason::DeadlineReached)
    } else if iteration >= config.max_iterations {
        Decision::Stop(StopReason::IterationCap)
    } else {
        Decision::Continue
    }
}
