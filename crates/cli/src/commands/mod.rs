pub mod ask;
pub mod config_cmd;
pub mod remind;
pub mod serve;
pub mod state_cmd;

use std::path::Path;

use chorebot::CliResult;
use chorebot_config::AppConfig;

/// Load `--config` if given, else `~/.chorebot/config.toml`.
pub fn load_config(path: Option<&Path>) -> CliResult<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}
