//! `chorebot config`: configuration helpers.

use std::path::Path;

use chorebot::CliResult;
use chorebot_config::AppConfig;

use crate::ConfigAction;

pub fn run(config_path: Option<&Path>, action: Option<ConfigAction>) -> CliResult<()> {
    match action.unwrap_or(ConfigAction::Default) {
        ConfigAction::Default => print!("{}", AppConfig::default_toml()),
        ConfigAction::Path => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
            println!("{}", path.display());
        }
        ConfigAction::Check => {
            let config = super::load_config(config_path)?;
            println!("Config OK");
            println!("  Provider:   {} ({})", config.provider, config.model);
            println!("  API key:    {}", if config.has_api_key() { "set" } else { "missing" });
            println!("  Store:      {} / {}", config.store.backend, config.store.record);
            println!("  Slack:      {}", if config.slack.bot_token.is_some() { "bot token set" } else { "no bot token" });
            println!("  Calendar:   {}", if config.calendar_enabled() { "enabled" } else { "disabled" });
            println!(
                "  Reminders:  {} -> {}",
                config.reminder.schedules.join(", "),
                config.reminder.channel.as_deref().unwrap_or("(no channel)")
            );
            println!("  Gateway:    {}:{}", config.gateway.host, config.gateway.port);
        }
    }
    Ok(())
}
