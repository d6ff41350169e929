//! Typed decoding of provider tool calls.
//!
//! Provider output is untrusted. Every call is decoded into a
//! [`ToolInvocation`] before anything runs, so unknown names and malformed
//! arguments are rejected at the boundary.

use chorebot_core::error::ToolError;
use chorebot_core::ToolCall;
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub const READ_STATE: &str = "readState";
pub const UPDATE_STATE: &str = "updateState";
pub const CREATE_CALENDAR_EVENT: &str = "createCalendarEvent";

/// Arguments for `updateState`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateStateArgs {
    pub description: String,
}

/// Arguments for `createCalendarEvent`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventArgs {
    pub summary: String,
    pub start_date_time: String,
    pub end_date_time: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One validated tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    ReadState,
    UpdateState(UpdateStateArgs),
    CreateCalendarEvent(CalendarEventArgs),
}

impl ToolInvocation {
    /// Decode a named call with JSON arguments.
    pub fn decode(name: &str, arguments: &serde_json::Value) -> Result<Self, ToolError> {
        match name {
            READ_STATE => Ok(Self::ReadState),
            UPDATE_STATE => Ok(Self::UpdateState(decode_args(name, arguments)?)),
            CREATE_CALENDAR_EVENT => Ok(Self::CreateCalendarEvent(decode_args(name, arguments)?)),
            other => Err(ToolError::UnknownOperation(other.to_string())),
        }
    }

    pub fn from_call(call: &ToolCall) -> Result<Self, ToolError> {
        Self::decode(&call.name, &call.arguments)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadState => READ_STATE,
            Self::UpdateState(_) => UPDATE_STATE,
            Self::CreateCalendarEvent(_) => CREATE_CALENDAR_EVENT,
        }
    }
}

/// Deserialize tool arguments into a typed struct.
pub fn decode_args<T: DeserializeOwned>(tool: &str, arguments: &serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| ToolError::InvalidArguments(format!("{tool}: {e}")))
}
