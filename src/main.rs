// Chill - iterative calm-rewrite engine
// Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chill::client::StructuredClient;
use chill::config::{load_config, Config};
use chill::improve::{ImproveStyle, ImprovementLoop, ImprovementResult};
use chill::logging::RecordLog;
use chill::providers::create_backend;

const SAMPLE_TEXT: &str = "You guys are so slow, we will never ship it!";

/// Command-line arguments for chill
#[derive(Parser, Debug)]
#[command(name = "chill")]
#[command(about = "Rewrite inflammatory text into a calmer form")]
#[command(version)]
struct Args {
    /// Text to be improved (defaults to a built-in sample)
    #[arg(short, long)]
    text: Option<String>,

    #[arg(long)]
    max_iterations: Option<u32>,

    #[arg(long)]
    min_iterations: Option<u32>,

    /// Score that ends the session once min_iterations have run
    #[arg(long)]
    good_score: Option<f64>,

    /// Score accepted once the deadline has passed
    #[arg(long)]
    good_score_if_late: Option<f64>,

    #[arg(long)]
    deadline_seconds: Option<f64>,

    /// Improve prompt style: variants or simple
    #[arg(long)]
    style: Option<ImproveStyle>,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        let improvement = &mut config.improvement;
        if let Some(n) = self.max_iterations {
            improvement.max_iterations = n;
        }
        if let Some(n) = self.min_iterations {
            improvement.min_iterations = n;
        }
        if let Some(score) = self.good_score {
            improvement.good_score = score;
        }
        if let Some(score) = self.good_score_if_late {
            improvement.good_score_if_late = score;
        }
        if let Some(seconds) = self.deadline_seconds {
            improvement.deadline_seconds = seconds;
        }
        if let Some(style) = self.style {
            improvement.style = style;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so --json output stays clean
    let default_filter = if args.verbose { "chill=debug" } else { "chill=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = load_config().context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate()?;

    let backend = create_backend(&config.backend).context("Failed to create model backend")?;
    info!(
        "Using {} backend (model: {})",
        backend.name(),
        backend.model().unwrap_or("server default")
    );

    let log = match config.logging.resolved_dir() {
        Some(dir) => RecordLog::open(&dir).unwrap_or_else(|e| {
            warn!("Failed to open record log at {}: {}", dir.display(), e);
            RecordLog::disabled()
        }),
        None => RecordLog::disabled(),
    };

    let client = StructuredClient::new(backend)
        .with_log(log.clone())
        .with_generation(config.generation.max_tokens, config.generation.temperature);
    let runner = ImprovementLoop::new(client, config.improvement.clone()).with_log(log.clone());

    let text = args.text.as_deref().unwrap_or(SAMPLE_TEXT);
    let outcome = runner.run(text).await;
    log.flush().await;
    let result = outcome.context("Improvement failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    Ok(())
}

fn print_summary(result: &ImprovementResult) {
    let best = &result.candidate;
    println!("{}\n", best.edit());
    println!("Critique: {}", best.critique());
    println!(
        "Faithfulness {:.2} · Spiciness {:.2} · Overall {:.2}",
        best.faithfulness_score(),
        best.spicy_score(),
        best.overall_score()
    );
    println!(
        "{} of {} iterations ({:?}), {:.1}s, {} requests",
        result.iteration_count,
        result.max_allowed_iterations,
        result.stop_reason,
        result.time_used,
        result.total_request_count
    );
}
