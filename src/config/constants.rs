// Project-wide constants
//
// File and directory names live here so the config loader, the record log
// and the tests agree on them. Import via `use crate::config::constants::*;`.

/// Directory under the home directory holding config and logs.
pub const CONFIG_DIR: &str = ".chill";

/// Config file name inside `CONFIG_DIR`.
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "CHILL_CONFIG";

/// Default record log directory, relative to `CONFIG_DIR`.
pub const LOG_DIR: &str = "logs";

/// One JSON line per model call attempt.
pub const CALL_LOG_FILE: &str = "prompt_inputs_and_outputs.jsonl";

/// One JSON line per finished improvement session.
pub const SESSION_LOG_FILE: &str = "inputs_and_outputs.jsonl";
