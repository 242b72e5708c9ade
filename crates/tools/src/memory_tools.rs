//! Memory tools — let the model read and write its own long-term memory.

use async_trait::async_trait;
use nimbus_core::error::ToolError;
use nimbus_core::tool::{Tool, ToolContext, ToolResult};
use nimbus_memory::{FactStore, GoalStore};
use std::sync::Arc;

/// Record a fact into long-term memory.
pub struct LearnFactTool {
    store: Arc<FactStore>,
}

impl LearnFactTool {
    pub fn new(store: Arc<FactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for LearnFactTool {
    fn name(&self) -> &str {
        "learn_fact"
    }

    fn description(&self) -> &str {
        "Store a fact in long-term memory so it survives across sessions. Use a short category like 'user', 'environment', or 'preferences'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "description": "Grouping key for the fact"
                },
                "content": {
                    "type": "string",
                    "description": "The fact, as one sentence"
                },
                "confidence": {
                    "type": "number",
                    "description": "How certain the fact is, 0.0-1.0 (default 1.0)"
                }
            },
            "required": ["category", "content"]
        })
    }

    async fn execute(
        &self,
        _cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let category = arguments["category"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'category' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;
        let confidence = arguments["confidence"].as_f64().unwrap_or(1.0) as f32;

        self.store
            .learn(category, content, confidence)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "learn_fact".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(format!("Remembered: [{category}] {content}")))
    }
}

/// Recall facts from long-term memory.
pub struct RecallFactsTool {
    store: Arc<FactStore>,
}

impl RecallFactsTool {
    pub fn new(store: Arc<FactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RecallFactsTool {
    fn name(&self) -> &str {
        "recall_facts"
    }

    fn description(&self) -> &str {
        "Recall facts from long-term memory, optionally filtered by category."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "description": "Category to filter by (omit for all facts)"
                }
            }
        })
    }

    async fn execute(
        &self,
        _cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let category = arguments["category"].as_str().unwrap_or("");
        let facts = self.store.recall(category).await;

        if facts.is_empty() {
            return Ok(ToolResult::ok("No facts stored."));
        }

        let lines: Vec<String> = facts
            .iter()
            .map(|f| format!("- [{}] {} (confidence {:.1})", f.category, f.content, f.confidence))
            .collect();
        Ok(ToolResult::ok(lines.join("\n")))
    }
}

/// Set or update a standing goal.
pub struct SetGoalTool {
    store: Arc<GoalStore>,
}

impl SetGoalTool {
    pub fn new(store: Arc<GoalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SetGoalTool {
    fn name(&self) -> &str {
        "set_goal"
    }

    fn description(&self) -> &str {
        "Set or update a standing goal. Priority 1 is highest, 5 is lowest."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "What to accomplish"
                },
                "priority": {
                    "type": "integer",
                    "description": "1 (highest) to 5 (lowest), default 3"
                }
            },
            "required": ["description"]
        })
    }

    async fn execute(
        &self,
        _cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let description = arguments["description"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'description' argument".into()))?;
        let priority = arguments["priority"].as_u64().unwrap_or(3) as u8;

        self.store
            .set(description, priority)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "set_goal".into(),
                reason: e.to_string(),
            })?;

        Ok(ToolResult::ok(format!("Goal set (P{priority}): {description}")))
    }
}
