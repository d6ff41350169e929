//! Wiring: one place that turns an `AppConfig` into the running pieces.
//!
//! config → backend → store → tools → provider → loop → reminder.

use std::sync::Arc;

use chorebot_agent::{AgentLoop, ReminderTrigger};
use chorebot_channels::{ConsoleChannel, ResponseUrlClient, SlackChannel};
use chorebot_config::AppConfig;
use chorebot_core::channel::Channel;
use chorebot_core::error::StoreError;
use chorebot_core::event::{DomainEvent, EventBus};
use chorebot_core::provider::Provider;
use chorebot_core::state::KvBackend;
use chorebot_gateway::GatewayState;
use chorebot_store::{ChoreStore, InMemoryBackend, SqliteBackend};
use chorebot_tools::{CalendarClient, GoogleCalendarClient, ToolExecutor, chore_registry};
use tracing::{debug, info, warn};

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Everything a command needs, built once.
pub struct Runtime {
    pub config: AppConfig,
    pub events: Arc<EventBus>,
    pub store: Arc<ChoreStore>,
    pub agent: Arc<AgentLoop>,
}

impl Runtime {
    /// Build with the provider named in the config.
    pub async fn from_config(config: AppConfig) -> CliResult<Self> {
        let provider = chorebot_providers::build_from_config(&config);
        Self::with_provider(config, provider).await
    }

    /// Build around an explicit provider (tests, alternative backends).
    pub async fn with_provider(config: AppConfig, provider: Arc<dyn Provider>) -> CliResult<Self> {
        let events = Arc::new(EventBus::default());
        let offset = config.locale.offset();

        let backend = open_backend(&config).await?;
        let store = Arc::new(
            ChoreStore::new(backend, config.store.record.clone())
                .with_offset(offset)
                .with_events(events.clone()),
        );

        let calendar: Option<Arc<dyn CalendarClient>> = GoogleCalendarClient::from_config(&config.calendar)
            .map(|client| Arc::new(client) as Arc<dyn CalendarClient>);
        let registry = chore_registry(store.clone(), calendar, &config.locale.time_zone);
        info!(tools = ?registry.names(), record = %config.store.record, "Tools registered");

        let executor = Arc::new(ToolExecutor::new(Arc::new(registry)).with_events(events.clone()));
        let agent = Arc::new(
            AgentLoop::new(provider, executor, config.model.clone())
                .with_max_iterations(config.agent.max_iterations)
                .with_temperature(config.agent.temperature)
                .with_max_tokens(config.agent.max_tokens)
                .with_locale(offset, config.locale.time_zone.clone())
                .with_events(events.clone()),
        );

        Ok(Self {
            config,
            events,
            store,
            agent,
        })
    }

    /// The Slack channel, or the console when no bot token is configured.
    ///
    /// Slash-command answers reach their `response_url` either way.
    pub fn slack_channel(&self) -> Arc<dyn Channel> {
        match SlackChannel::from_config(&self.config.slack) {
            Some(slack) => Arc::new(slack),
            None => {
                warn!("No Slack bot token configured; mentions and reminders will be printed to stdout");
                Arc::new(ConsoleChannel::new().with_responder(ResponseUrlClient::new()))
            }
        }
    }

    /// A reminder trigger delivering through `channel`.
    ///
    /// `None` when reminders are disabled or have no target and none was
    /// given.
    pub fn reminder(&self, channel: Arc<dyn Channel>, target: Option<String>) -> Option<ReminderTrigger> {
        if !self.config.reminder.enabled {
            return None;
        }
        let target = target.or_else(|| self.config.reminder.channel.clone())?;
        Some(
            ReminderTrigger::new(
                self.store.clone(),
                self.agent.clone(),
                channel,
                target,
                self.config.reminder.prompt.clone(),
            )
            .with_offset(self.config.locale.offset())
            .with_events(self.events.clone()),
        )
    }

    /// Gateway state for `serve`.
    pub fn gateway_state(&self, slack: Arc<dyn Channel>, reminder: Option<Arc<ReminderTrigger>>) -> GatewayState {
        let state = GatewayState::new(self.store.clone(), self.agent.clone(), slack)
            .with_signing_secret(self.config.slack.signing_secret.clone())
            .with_api_token(self.config.gateway.api_token.clone())
            .with_events(self.events.clone());
        match reminder {
            Some(trigger) => state.with_reminder(trigger),
            None => state,
        }
    }

    /// Log domain events until the bus closes.
    pub fn spawn_event_logger(&self) -> tokio::task::JoinHandle<()> {
        let mut rx = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => log_event(&event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event logger lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Open the configured key-value backend.
pub async fn open_backend(config: &AppConfig) -> Result<Arc<dyn KvBackend>, StoreError> {
    match config.store.backend.as_str() {
        "memory" => {
            warn!("Using the in-memory store; chore state is lost on restart");
            Ok(Arc::new(InMemoryBackend::new()))
        }
        _ => {
            let path = config.store_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Storage(format!("cannot create {}: {e}", parent.display())))?;
            }
            info!(path = %path.display(), "Opening SQLite store");
            let backend = SqliteBackend::new(&format!("sqlite://{}", path.display())).await?;
            Ok(Arc::new(backend))
        }
    }
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::InstructionReceived { source, sender_id, content_preview, .. } => {
            info!(source = %source, sender = %sender_id, preview = %content_preview, "Instruction received");
        }
        DomainEvent::ResponseGenerated { model, finish_reason, tokens_used, .. } => {
            debug!(model = %model, finish_reason = %finish_reason, tokens_used, "Provider responded");
        }
        DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
            info!(tool = %tool_name, success, duration_ms, "Tool executed");
        }
        DomainEvent::StateWritten { record, last_updated, .. } => {
            info!(record = %record, last_updated = %last_updated, "Chore state written");
        }
        DomainEvent::ReminderProcessed { outcome, .. } => {
            debug!(outcome = %outcome, "Reminder event");
        }
        DomainEvent::ErrorOccurred { context, error_message, .. } => {
            warn!(context = %context, error = %error_message, "Error reported");
        }
    }
}
