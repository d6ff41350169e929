//! `updateState`: replace the chore description.

use async_trait::async_trait;
use chorebot_core::error::ToolError;
use chorebot_core::state::format_timestamp;
use chorebot_core::tool::{Tool, ToolResult};
use chorebot_store::ChoreStore;
use std::sync::Arc;

use crate::invocation::{decode_args, UpdateStateArgs, UPDATE_STATE};

#[derive(Clone)]
pub struct UpdateStateTool {
    store: Arc<ChoreStore>,
}

impl UpdateStateTool {
    pub fn new(store: Arc<ChoreStore>) -> Self {
        Self { store }
    }

    /// Replace the description. Exactly one store write on success.
    pub async fn apply(&self, args: UpdateStateArgs) -> Result<ToolResult, ToolError> {
        if args.description.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "updateState: description must not be empty".into(),
            ));
        }

        let state = self.store.update_description(&args.description).await?;
        Ok(ToolResult::ok(format!(
            "Chore assignments updated at {}.",
            format_timestamp(&state.last_updated)
        )))
    }
}

#[async_trait]
impl Tool for UpdateStateTool {
    fn name(&self) -> &str {
        UPDATE_STATE
    }

    fn description(&self) -> &str {
        "Replace the household chore assignments with a new description. \
         The description must be the complete, updated assignment text, not a diff: \
         read the current state first and carry over anything that did not change."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "The full new chore assignment text"
                }
            },
            "required": ["description"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.apply(decode_args(UPDATE_STATE, &arguments)?).await
    }
}
