//! `readState`: report the current chore assignments.

use async_trait::async_trait;
use chorebot_core::error::ToolError;
use chorebot_core::tool::{Tool, ToolResult};
use chorebot_store::ChoreStore;
use std::sync::Arc;

use crate::invocation::READ_STATE;

#[derive(Clone)]
pub struct ReadStateTool {
    store: Arc<ChoreStore>,
}

impl ReadStateTool {
    pub fn new(store: Arc<ChoreStore>) -> Self {
        Self { store }
    }

    pub async fn read(&self) -> Result<ToolResult, ToolError> {
        let state = self.store.read().await?;
        Ok(ToolResult::ok(state.describe()))
    }
}

#[async_trait]
impl Tool for ReadStateTool {
    fn name(&self) -> &str {
        READ_STATE
    }

    fn description(&self) -> &str {
        "Read the current household chore assignments and when they were last updated. \
         Call this before answering questions about who does what."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorebot_store::InMemoryBackend;

    #[tokio::test]
    async fn reports_description_and_timestamp() {
        let store = Arc::new(ChoreStore::new(Arc::new(InMemoryBackend::new()), "chore-state"));
        let written = store.update_description("Alice: trash, Bob: dishes").await.unwrap();

        let tool = ReadStateTool::new(store);
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("Alice"));
        assert!(result.output.contains("Bob"));
        assert!(result
            .output
            .contains(&chorebot_core::state::format_timestamp(&written.last_updated)));
    }

    #[tokio::test]
    async fn reading_twice_changes_nothing() {
        let store = Arc::new(ChoreStore::new(Arc::new(InMemoryBackend::new()), "chore-state"));
        let tool = ReadStateTool::new(store.clone());

        tool.execute(serde_json::json!({})).await.unwrap();
        let before = store.read().await.unwrap();
        tool.execute(serde_json::json!({})).await.unwrap();
        tool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(store.read().await.unwrap(), before);
    }
}
