//! `chorebot ask`: run one instruction through the loop.

use std::path::Path;

use chorebot::{CliResult, Runtime};
use chorebot_core::channel::{ChannelId, ChannelMessage, InstructionSource};

pub async fn run(config_path: Option<&Path>, message: String) -> CliResult<()> {
    let config = super::load_config(config_path)?;
    if !config.has_api_key() && config.provider != "ollama" {
        eprintln!("  No API key configured. Set CHOREBOT_API_KEY or OPENAI_API_KEY,");
        eprintln!("  or add `api_key` to {}", chorebot_config::AppConfig::config_dir().join("config.toml").display());
        return Err("No API key found".into());
    }

    let runtime = Runtime::from_config(config).await?;
    let instruction = ChannelMessage {
        channel_id: ChannelId("cli".into()),
        source: InstructionSource::Cli,
        sender_id: "local".into(),
        sender_name: None,
        content: message,
        chat_id: "cli".into(),
        reply_to_message_id: None,
        response_url: None,
    };

    let outcome = runtime.agent.handle(&instruction).await;
    println!("{}", outcome.text);
    if !outcome.is_stop() {
        eprintln!(
            "  (ended with {} after {} round trip(s), {} tool call(s))",
            outcome.termination, outcome.iterations, outcome.tool_calls
        );
    }
    Ok(())
}
