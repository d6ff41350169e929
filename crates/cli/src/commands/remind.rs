//! `chorebot remind`: run one reminder tick by hand.

use std::path::Path;
use std::sync::Arc;

use chorebot::{CliResult, Runtime};
use chorebot_agent::ReminderOutcome;
use chorebot_channels::ConsoleChannel;
use chorebot_core::channel::Channel;

pub async fn run(config_path: Option<&Path>, print: bool) -> CliResult<()> {
    let config = super::load_config(config_path)?;
    let runtime = Runtime::from_config(config).await?;

    let (channel, target): (Arc<dyn Channel>, Option<String>) = if print {
        (Arc::new(ConsoleChannel::new()), Some("console".into()))
    } else {
        (runtime.slack_channel(), None)
    };

    let trigger = runtime
        .reminder(channel, target)
        .ok_or("Reminders are disabled or reminder.channel is not set (use --print to preview)")?;

    match trigger.fire().await? {
        ReminderOutcome::Skipped { last_sent } => {
            println!("Already reminded today (last sent {last_sent}).");
        }
        ReminderOutcome::GenerationFailed { termination, text } => {
            eprintln!("Reminder not sent: the assistant ended with {termination}.");
            eprintln!("{text}");
        }
        ReminderOutcome::DeliveryFailed { reason } => {
            return Err(format!("Reminder delivery failed: {reason}").into());
        }
        ReminderOutcome::Sent { at, .. } => {
            if !print {
                println!("Reminder sent at {at}.");
            }
        }
    }
    Ok(())
}
