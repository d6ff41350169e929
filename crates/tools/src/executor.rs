//! Tool executor: turns one provider tool call into one textual result.
//!
//! Nothing escapes as an error: unknown tools, bad arguments, store and
//! calendar failures all come back as an `Error: ...` result the model can
//! read and react to.

use chorebot_core::message::MessageToolCall;
use chorebot_core::{DomainEvent, EventBus, ToolCall, ToolDefinition, ToolResult};
use chorebot_core::error::ToolError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::ChoreTools;
use crate::invocation::ToolInvocation;

pub struct ToolExecutor {
    tools: Arc<ChoreTools>,
    events: Option<Arc<EventBus>>,
}

impl ToolExecutor {
    pub fn new(tools: Arc<ChoreTools>) -> Self {
        Self {
            tools,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Definitions offered to the provider on every request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    /// Run one call. The result always carries the call's id.
    pub async fn execute(&self, call: &MessageToolCall) -> ToolResult {
        let started = Instant::now();
        let outcome = self.dispatch(call).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::failed(format!("Error: {e}"))
            }
        };
        result.call_id = call.id.clone();

        debug!(tool = %call.name, success = result.success, duration_ms, "Tool executed");
        if let Some(events) = &self.events {
            events.publish(DomainEvent::ToolExecuted {
                tool_name: call.name.clone(),
                success: result.success,
                duration_ms,
                timestamp: Utc::now(),
            });
        }
        result
    }

    async fn dispatch(&self, call: &MessageToolCall) -> Result<ToolResult, ToolError> {
        let parsed = ToolCall::from_message_call(call)?;
        // Name and argument shape are settled here; tools get typed input.
        let invocation = ToolInvocation::from_call(&parsed)?;
        debug!(tool = invocation.name(), call_id = %parsed.id, "Dispatching tool call");
        self.tools.run(invocation).await
    }
}
