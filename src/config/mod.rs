// Configuration module
// Public interface for configuration loading

mod backend;
pub mod constants;
mod loader;
mod settings;

pub use backend::BackendEntry;
pub use loader::{config_from_env, load_config, load_config_from_path};
pub use settings::{Config, GenerationConfig, LoggingConfig};
