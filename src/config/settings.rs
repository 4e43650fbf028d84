// Configuration settings structures

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::backend::BackendEntry;
use super::constants::{CONFIG_DIR, LOG_DIR};
use crate::improve::LoopConfig;
use crate::providers::types::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

/// Sampling parameters sent with every model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Where call and session records go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Defaults to `~/.chill/logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl LoggingConfig {
    /// Directory to write records into, or `None` when recording is off.
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        self.dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(LOG_DIR)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendEntry,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub improvement: LoopConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn with_backend(backend: BackendEntry) -> Self {
        Self {
            backend,
            generation: GenerationConfig::default(),
            improvement: LoopConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.improvement.validate()?;

        if self.generation.max_tokens == 0 {
            bail!("generation.max_tokens must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            bail!(
                "generation.temperature must be between 0.0 and 2.0, got {}",
                self.generation.temperature
            );
        }
        Ok(())
    }
}
