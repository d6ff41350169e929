//! The orchestration loop.
//!
//! One instruction in, one text answer out. The loop walks
//! `Requesting → Deciding → ToolDispatch → Requesting ...` until the
//! provider stops, the output is truncated, the provider fails, or the
//! iteration cap is hit. Every exit path produces user-facing text.

use std::sync::Arc;
use chorebot_core::channel::ChannelMessage;
use chorebot_core::event::{DomainEvent, EventBus};
use chorebot_core::message::{Conversation, Message, MessageToolCall};
use chorebot_core::provider::{FinishReason, Provider, ProviderRequest, ProviderResponse};
use chorebot_tools::ToolExecutor;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use tracing::{debug, info, warn};

/// Returned when the provider stops with no text.
pub const EMPTY_STOP_FALLBACK: &str = "Done! (no additional details)";

/// Returned when the provider hit its output token limit.
pub const LENGTH_LIMIT_FALLBACK: &str =
    "Sorry, that response was too long. Could you restate your request more briefly?";

/// Returned for unrecognized finish reasons and when the iteration cap is hit.
pub const GENERIC_FALLBACK: &str = "Your request was processed with multiple steps.";

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The provider finished with a final answer.
    Stop,
    /// The provider truncated its output.
    LengthLimit,
    /// The round-trip cap was reached while tools were still being requested.
    IterationExceeded,
    /// The provider call itself failed.
    ProviderFailure(String),
    /// Any other finish reason.
    Other(String),
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Stop => write!(f, "stop"),
            Termination::LengthLimit => write!(f, "length_limit"),
            Termination::IterationExceeded => write!(f, "iteration_exceeded"),
            Termination::ProviderFailure(reason) => write!(f, "provider_failure: {reason}"),
            Termination::Other(reason) => write!(f, "other: {reason}"),
        }
    }
}

/// The result of one instruction.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text to show the user
    pub text: String,
    pub termination: Termination,
    /// Provider round trips made
    pub iterations: u32,
    /// Tool calls executed
    pub tool_calls: u32,
}

impl TurnOutcome {
    pub fn is_stop(&self) -> bool {
        self.termination == Termination::Stop
    }
}

enum LoopState {
    Requesting,
    Deciding(ProviderResponse),
    ToolDispatch(Vec<MessageToolCall>),
    Terminal(Termination, String),
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Drives the provider and the tool executor for one instruction at a time.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    executor: Arc<ToolExecutor>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
    offset: FixedOffset,
    time_zone: String,
    event_bus: Arc<EventBus>,
    clock: Clock,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, executor: Arc<ToolExecutor>, model: impl Into<String>) -> Self {
        Self {
            provider,
            executor,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            offset: Utc.fix(),
            time_zone: "UTC".into(),
            event_bus: Arc::new(EventBus::default()),
            clock: Arc::new(Utc::now),
        }
    }

    /// Set the maximum number of provider round trips per instruction.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Set the default max tokens per response.
    pub fn with_max_tokens(mut self, max: Option<u32>) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Local offset and zone name used for "today" in the system prompt.
    pub fn with_locale(mut self, offset: FixedOffset, time_zone: impl Into<String>) -> Self {
        self.offset = offset;
        self.time_zone = time_zone.into();
        self
    }

    pub fn with_events(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// The fixed system instruction, stamped with the local date.
    pub fn system_prompt(&self) -> String {
        let now = (self.clock)().with_timezone(&self.offset);
        let tool_names: Vec<String> = self.executor.definitions().into_iter().map(|d| d.name).collect();

        let mut prompt = String::from(
            "You are Chorebot, a helpful assistant that keeps track of who is responsible \
             for which household chores.\n\n\
             The chore assignments are stored as a single free-text description. \
             Use readState to see the current assignments before answering questions about them. \
             To change them, call updateState with the COMPLETE new description: \
             carry over every assignment that did not change.\n",
        );
        if tool_names.iter().any(|n| n == "createCalendarEvent") {
            prompt.push_str(
                "When asked to schedule something, use createCalendarEvent with ISO 8601 \
                 local date-times.\n",
            );
        }
        prompt.push_str(&format!(
            "\nAvailable tools: {}.\n\
             Keep answers short and friendly; they are posted to a team chat.\n\n\
             Today is {} ({}, time zone {}). Current local time: {}.",
            tool_names.join(", "),
            now.format("%A"),
            now.format("%Y-%m-%d"),
            self.time_zone,
            now.format("%H:%M"),
        ));
        prompt
    }

    /// Handle a normalized chat instruction.
    pub async fn handle(&self, message: &ChannelMessage) -> TurnOutcome {
        self.event_bus.publish(DomainEvent::InstructionReceived {
            source: message.source.to_string(),
            sender_id: message.sender_id.clone(),
            content_preview: message.content.chars().take(80).collect(),
            timestamp: Utc::now(),
        });
        self.run(&message.content).await
    }

    /// Run one instruction to a terminal state.
    pub async fn run(&self, instruction: &str) -> TurnOutcome {
        let mut conversation = Conversation::new();
        conversation.push(Message::system(self.system_prompt()));
        conversation.push(Message::user(instruction));
        self.run_conversation(&mut conversation).await
    }

    /// Drive an already-seeded conversation. Appends every message exchanged.
    pub async fn run_conversation(&self, conversation: &mut Conversation) -> TurnOutcome {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            "Processing instruction"
        );

        let tool_definitions = self.executor.definitions();
        let mut iterations = 0u32;
        let mut tool_calls = 0u32;
        let mut state = LoopState::Requesting;

        loop {
            state = match state {
                LoopState::Requesting => {
                    if iterations >= self.max_iterations {
                        warn!(
                            conversation_id = %conversation.id,
                            iterations,
                            "Iteration cap reached"
                        );
                        LoopState::Terminal(Termination::IterationExceeded, GENERIC_FALLBACK.into())
                    } else {
                        iterations += 1;
                        debug!(conversation_id = %conversation.id, iteration = iterations, "Requesting completion");

                        let request = ProviderRequest {
                            model: self.model.clone(),
                            messages: conversation.messages.clone(),
                            temperature: self.temperature,
                            max_tokens: self.max_tokens,
                            tools: tool_definitions.clone(),
                        };

                        match self.provider.complete(request).await {
                            Ok(response) => {
                                self.event_bus.publish(DomainEvent::ResponseGenerated {
                                    conversation_id: conversation.id.to_string(),
                                    model: response.model.clone(),
                                    finish_reason: response.finish_reason.to_string(),
                                    tokens_used: response.usage.as_ref().map_or(0, |u| u.total_tokens),
                                    timestamp: Utc::now(),
                                });
                                LoopState::Deciding(response)
                            }
                            Err(e) => {
                                warn!(conversation_id = %conversation.id, error = %e, "Provider call failed");
                                self.event_bus.publish(DomainEvent::ErrorOccurred {
                                    context: "provider".into(),
                                    error_message: e.to_string(),
                                    timestamp: Utc::now(),
                                });
                                LoopState::Terminal(
                                    Termination::ProviderFailure(e.to_string()),
                                    format!("Sorry, I couldn't reach the assistant service: {e}"),
                                )
                            }
                        }
                    }
                }

                LoopState::Deciding(response) => match response.finish_reason.clone() {
                    FinishReason::Stop => {
                        let text = if response.message.content.trim().is_empty() {
                            EMPTY_STOP_FALLBACK.to_string()
                        } else {
                            response.message.content.clone()
                        };
                        conversation.push(response.message);
                        LoopState::Terminal(Termination::Stop, text)
                    }
                    FinishReason::ToolCalls if !response.message.tool_calls.is_empty() => {
                        let calls = response.message.tool_calls.clone();
                        conversation.push(response.message);
                        LoopState::ToolDispatch(calls)
                    }
                    FinishReason::ToolCalls => LoopState::Terminal(
                        Termination::Other("tool_calls without calls".into()),
                        GENERIC_FALLBACK.into(),
                    ),
                    FinishReason::Length => {
                        LoopState::Terminal(Termination::LengthLimit, LENGTH_LIMIT_FALLBACK.into())
                    }
                    FinishReason::Other(reason) => {
                        LoopState::Terminal(Termination::Other(reason), GENERIC_FALLBACK.into())
                    }
                },

                LoopState::ToolDispatch(calls) => {
                    debug!(tool_count = calls.len(), "Executing tool calls");
                    // Sequential: a later call may depend on an earlier write.
                    for call in &calls {
                        let result = self.executor.execute(call).await;
                        tool_calls += 1;
                        conversation.push(Message::tool_result(&result.call_id, &result.output));
                    }
                    LoopState::Requesting
                }

                LoopState::Terminal(termination, text) => {
                    info!(
                        conversation_id = %conversation.id,
                        termination = %termination,
                        iterations,
                        tool_calls,
                        "Instruction finished"
                    );
                    return TurnOutcome {
                        text,
                        termination,
                        iterations,
                        tool_calls,
                    };
                }
            };
        }
    }
}
