//! The reminder trigger.
//!
//! Fired by the scheduler (twice a day by default) or by hand. At most one
//! reminder goes out per local calendar day: `lastSent` is only stamped
//! after the chat platform accepted the message, so a failed delivery is
//! retried on the next tick. Ticks are serialized, so a scheduled tick and
//! a manual one cannot both pass the `lastSent` check.

use std::sync::Arc;
use chorebot_core::channel::Channel;
use chorebot_core::error::StoreError;
use chorebot_core::event::{DomainEvent, EventBus};
use chorebot_store::ChoreStore;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::loop_runner::{AgentLoop, Termination};

/// What one reminder tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReminderOutcome {
    /// A reminder already went out today. Nothing was called or written.
    Skipped { last_sent: DateTime<Utc> },
    /// The loop did not produce a final answer. Nothing was delivered.
    GenerationFailed { termination: Termination, text: String },
    /// The channel refused the message. `lastSent` was left alone.
    DeliveryFailed { reason: String },
    /// Delivered and stamped.
    Sent { text: String, at: DateTime<Utc> },
}

impl ReminderOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReminderOutcome::Skipped { .. } => "skipped",
            ReminderOutcome::GenerationFailed { .. } => "generation_failed",
            ReminderOutcome::DeliveryFailed { .. } => "delivery_failed",
            ReminderOutcome::Sent { .. } => "sent",
        }
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct ReminderTrigger {
    store: Arc<ChoreStore>,
    agent: Arc<AgentLoop>,
    channel: Arc<dyn Channel>,
    target: String,
    prompt: String,
    offset: FixedOffset,
    event_bus: Option<Arc<EventBus>>,
    clock: Clock,
    firing: Mutex<()>,
}

impl ReminderTrigger {
    pub fn new(
        store: Arc<ChoreStore>,
        agent: Arc<AgentLoop>,
        channel: Arc<dyn Channel>,
        target: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            store,
            agent,
            channel,
            target: target.into(),
            prompt: prompt.into(),
            offset: Utc.fix(),
            event_bus: None,
            clock: Arc::new(Utc::now),
            firing: Mutex::new(()),
        }
    }

    /// Offset whose calendar date decides "already sent today".
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_events(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Run one tick. Only store failures are errors.
    pub async fn fire(&self) -> Result<ReminderOutcome, StoreError> {
        let _firing = self.firing.lock().await;
        let outcome = self.tick().await?;
        info!(outcome = outcome.label(), target = %self.target, "Reminder processed");
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ReminderProcessed {
                outcome: outcome.label().into(),
                timestamp: Utc::now(),
            });
        }
        Ok(outcome)
    }

    async fn tick(&self) -> Result<ReminderOutcome, StoreError> {
        let now = (self.clock)();
        let state = self.store.read().await?;
        if let Some(last_sent) = state.last_sent.filter(|_| state.reminder_sent_on(now, self.offset)) {
            return Ok(ReminderOutcome::Skipped { last_sent });
        }

        let outcome = self.agent.run(&self.prompt).await;
        if outcome.termination != Termination::Stop {
            warn!(termination = %outcome.termination, "Reminder generation did not finish");
            return Ok(ReminderOutcome::GenerationFailed {
                termination: outcome.termination,
                text: outcome.text,
            });
        }

        if let Err(e) = self.channel.send(&self.target, &outcome.text, None).await {
            warn!(error = %e, target = %self.target, "Reminder delivery failed");
            return Ok(ReminderOutcome::DeliveryFailed {
                reason: e.to_string(),
            });
        }

        self.store.mark_sent(now).await?;
        Ok(ReminderOutcome::Sent {
            text: outcome.text,
            at: now,
        })
    }
}
