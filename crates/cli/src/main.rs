//! Chorebot CLI: the main entry point.
//!
//! Commands:
//! - `serve`  : Slack endpoints, state API and the reminder scheduler
//! - `ask`    : Run one instruction through the assistant
//! - `remind` : Run one reminder tick now
//! - `state`  : Show, set, or list backups of the chore record
//! - `config` : Print the default config, its path, or check it

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "chorebot",
    about = "Chorebot: keeps track of who does which chores, over Slack",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.chorebot/config.toml)
    #[arg(short, long, global = true, env = "CHOREBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway and the reminder scheduler
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send a single instruction to the assistant
    Ask {
        #[arg(short, long)]
        message: String,
    },

    /// Run one reminder tick (respects the once-a-day rule)
    Remind {
        /// Print the reminder instead of posting it to Slack
        #[arg(long)]
        print: bool,
    },

    /// Inspect or edit the chore record
    State {
        #[command(subcommand)]
        action: StateAction,
    },

    /// Configuration helpers (default: print a default config)
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub(crate) enum StateAction {
    /// Print the current record
    Show {
        /// Print the raw wire shape
        #[arg(long)]
        json: bool,
    },
    /// Replace the chore description
    Set { text: String },
    /// List date-keyed backups
    Backups,
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Print a default config file
    Default,
    /// Print the config file path
    Path,
    /// Load, validate, and summarize the config
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Ask { message } => commands::ask::run(config, message).await?,
        Commands::Remind { print } => commands::remind::run(config, print).await?,
        Commands::State { action } => commands::state_cmd::run(config, action).await?,
        Commands::Config { action } => commands::config_cmd::run(config, action)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_state_set() {
        let cli = Cli::try_parse_from(["chorebot", "--config", "/tmp/c.toml", "state", "set", "Alice: trash"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/c.toml")));
        assert!(matches!(cli.command, Commands::State { action: StateAction::Set { ref text } } if text == "Alice: trash"));
    }

    #[test]
    fn ask_requires_message() {
        assert!(Cli::try_parse_from(["chorebot", "ask"]).is_err());
        assert!(Cli::try_parse_from(["chorebot", "ask", "-m", "who has trash?"]).is_ok());
    }
}
