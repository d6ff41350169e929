//! Chore tools for Chorebot.
//!
//! The model gets exactly these operations: read the chore record, replace
//! it, and (when a calendar is configured) create a calendar event.

pub mod calendar;
pub mod executor;
pub mod invocation;
pub mod read_state;
pub mod update_state;

use chorebot_core::error::ToolError;
use chorebot_core::provider::ToolDefinition;
use chorebot_core::tool::{ToolRegistry, ToolResult};
use chorebot_store::ChoreStore;
use std::sync::Arc;

pub use calendar::{CalendarClient, CalendarError, CalendarEvent, CreateCalendarEventTool, GoogleCalendarClient};
pub use executor::ToolExecutor;
pub use invocation::ToolInvocation;

use invocation::CREATE_CALENDAR_EVENT;
use read_state::ReadStateTool;
use update_state::UpdateStateTool;

/// The tool set for one chore record.
///
/// The registry feeds definitions to the provider; execution goes through
/// [`ChoreTools::run`] with an already-decoded [`ToolInvocation`].
pub struct ChoreTools {
    read: ReadStateTool,
    update: UpdateStateTool,
    calendar: Option<CreateCalendarEventTool>,
    registry: ToolRegistry,
}

impl ChoreTools {
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run a decoded invocation against its tool.
    pub async fn run(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        match invocation {
            ToolInvocation::ReadState => self.read.read().await,
            ToolInvocation::UpdateState(args) => self.update.apply(args).await,
            ToolInvocation::CreateCalendarEvent(args) => match &self.calendar {
                Some(tool) => tool.create(args).await,
                None => Err(ToolError::UnknownOperation(CREATE_CALENDAR_EVENT.into())),
            },
        }
    }
}

/// Build the tool set for one chore record.
///
/// `createCalendarEvent` is only registered when a calendar client is given.
pub fn chore_registry(
    store: Arc<ChoreStore>,
    calendar: Option<Arc<dyn CalendarClient>>,
    time_zone: &str,
) -> ChoreTools {
    let read = ReadStateTool::new(store.clone());
    let update = UpdateStateTool::new(store);
    let calendar = calendar.map(|client| CreateCalendarEventTool::new(client, time_zone));

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(read.clone()));
    registry.register(Box::new(update.clone()));
    if let Some(tool) = &calendar {
        registry.register(Box::new(tool.clone()));
    }

    ChoreTools {
        read,
        update,
        calendar,
        registry,
    }
}
