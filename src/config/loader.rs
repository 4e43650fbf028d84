// Configuration loader
// Loads settings from ~/.chill/config.toml (or $CHILL_CONFIG) or environment variables

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::backend::BackendEntry;
use super::constants::{CONFIG_DIR, CONFIG_FILE, CONFIG_PATH_ENV};
use super::settings::Config;

/// Load configuration from the config file, falling back to the environment.
pub fn load_config() -> Result<Config> {
    if let Some(path) = config_path() {
        if path.exists() {
            return load_config_from_path(&path);
        }
    }

    config_from_env(|key| std::env::var(key).ok())
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Parse and validate a TOML config file.
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    config.validate()?;
    Ok(config)
}

/// Build a config from environment-style variables.
///
/// `lookup` is `std::env::var` in production; tests pass a map.
/// Missing credentials are left empty so the backend constructor reports them.
pub fn config_from_env<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
    let worker = var("LLM_WORKER").unwrap_or_else(|| "anthropic".to_string());

    let backend = match worker.as_str() {
        "http" => BackendEntry::LlamaServer {
            url: var("LLM_SERVER_URL"),
        },
        "mistral" => BackendEntry::Mistral {
            api_key: var("MISTRAL_API_KEY").unwrap_or_default(),
            url: var("MISTRAL_API_URL"),
            model: None,
            request_interval_ms: None,
        },
        "anthropic" => BackendEntry::Anthropic {
            api_key: var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: None,
            url: None,
        },
        "runpod" => BackendEntry::Runpod {
            endpoint_id: var("RUNPOD_ENDPOINT_ID").unwrap_or_default(),
            api_key: var("RUNPOD_API_KEY").unwrap_or_default(),
            base_url: None,
        },
        "in_memory" => bail!(
            "LLM_WORKER=in_memory is not supported: chill does not load models itself.\n\n\
            Serve the model with a llama.cpp server instead and set:\n\
            export LLM_WORKER=http\n\
            export LLM_SERVER_URL=\"http://localhost:5834/v1/chat/completions\""
        ),
        other => bail!(
            "Invalid LLM_WORKER '{}' (expected one of: http, mistral, anthropic, runpod)",
            other
        ),
    };

    let mut config = Config::with_backend(backend);

    if let Some(max_tokens) = var("MAX_TOKENS") {
        config.generation.max_tokens = max_tokens
            .parse()
            .with_context(|| format!("MAX_TOKENS must be a positive integer, got '{}'", max_tokens))?;
    }
    if let Some(temperature) = var("TEMPERATURE") {
        config.generation.temperature = temperature
            .parse()
            .with_context(|| format!("TEMPERATURE must be a number, got '{}'", temperature))?;
    }

    config.validate()?;
    Ok(config)
}
