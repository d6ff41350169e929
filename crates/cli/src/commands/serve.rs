//! `chorebot serve`: gateway plus reminder scheduler.

use std::path::Path;
use std::sync::Arc;

use chorebot::{CliResult, Runtime};
use chorebot_workflow::Scheduler;
use tracing::{error, info, warn};

pub async fn run(config_path: Option<&Path>, port: Option<u16>) -> CliResult<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(port) = port {
        config.gateway.port = port;
    }
    if !config.has_api_key() && config.provider != "ollama" {
        warn!("No API key configured; every instruction will end in a provider failure");
    }

    let runtime = Runtime::from_config(config).await?;
    let _event_logger = runtime.spawn_event_logger();

    let slack = runtime.slack_channel();
    let reminder = runtime.reminder(slack.clone(), None).map(Arc::new);

    match &reminder {
        Some(trigger) => {
            let (scheduler, errors) =
                Scheduler::from_config(&runtime.config.reminder, runtime.config.locale.offset()).await;
            for e in &errors {
                warn!(error = %e, "Ignoring invalid reminder schedule");
            }
            info!(schedules = ?scheduler.schedules().await, "Reminder scheduler started");

            let (mut ticks, _scheduler_handle) = scheduler.start();
            let trigger = trigger.clone();
            tokio::spawn(async move {
                while let Some(tick) = ticks.recv().await {
                    if let Err(e) = trigger.fire().await {
                        error!(schedule = %tick.schedule, error = %e, "Reminder tick failed");
                    }
                }
            });
        }
        None => info!("Scheduled reminders off (disabled or no reminder.channel)"),
    }

    let addr = format!("{}:{}", runtime.config.gateway.host, runtime.config.gateway.port);
    println!("Chorebot gateway on http://{addr}");
    println!("   Record:    {} ({})", runtime.store.record(), runtime.store.backend_name());
    println!("   Model:     {}", runtime.config.model);
    println!("   Reminders: {}", if reminder.is_some() { "scheduled" } else { "off" });

    let state = Arc::new(runtime.gateway_state(slack, reminder));
    chorebot_gateway::serve(state, &addr).await
}
