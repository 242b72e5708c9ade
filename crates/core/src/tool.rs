//! Tool trait and registry — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world: execute
//! shell commands, read/write files, make HTTP requests, delegate to
//! subagents. The registry is an immutable catalog snapshot; swapping in a
//! new catalog means building a new registry and replacing the `Arc`.

use crate::error::ToolError;
use crate::message::{ConversationId, MessageToolCall};
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-invocation context passed to every tool execution.
///
/// Carries the conversation the invocation belongs to, so tools that report
/// back asynchronously know where to deliver, and the turn's wall-clock
/// deadline so a synchronous child task cannot outlive its parent turn.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub conversation_id: Option<ConversationId>,
    pub deadline: Option<tokio::time::Instant>,
}

impl ToolContext {
    pub fn for_conversation(id: ConversationId) -> Self {
        Self {
            conversation_id: Some(id),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: tokio::time::Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content fed back to the model
    pub output: String,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }
}

/// The core Tool trait.
///
/// Each tool (shell, read_file, write_file, http_request, subagent, etc.)
/// implements this trait. Tools are registered in the ToolRegistry and made
/// available to the agent loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool. `arguments` is always a JSON object; the registry
    /// rejects anything else before this is called.
    async fn execute(
        &self,
        cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
///
/// Tools are kept in registration order so the catalog sent to the model is
/// stable across calls. Handles are `Arc` so a delegator can derive a
/// restricted child registry without re-constructing tools.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name,
    /// keeping its original position.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names, in catalog order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Derive a new registry without the named tools. Used to build
    /// restricted child catalogs for delegation.
    pub fn without(&self, excluded: &[&str]) -> ToolRegistry {
        ToolRegistry {
            tools: self
                .tools
                .iter()
                .filter(|t| !excluded.contains(&t.name()))
                .cloned()
                .collect(),
        }
    }

    /// Dispatch a tool call requested by the model.
    ///
    /// Parses the raw argument string into a JSON object here, at the
    /// boundary, so individual tools never see malformed payloads. Returns
    /// the tool's output text; any `Err` is absorbed by the caller into an
    /// error tool-result, never a crash.
    pub async fn dispatch(
        &self,
        cx: &ToolContext,
        call: &MessageToolCall,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let raw = call.arguments.trim();
        let arguments: serde_json::Value = if raw.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(raw)
                .map_err(|e| ToolError::InvalidArguments(format!("malformed JSON: {e}")))?
        };
        if !arguments.is_object() {
            return Err(ToolError::InvalidArguments(
                "arguments must be a JSON object".into(),
            ));
        }

        let result = tool.execute(cx, arguments).await?;
        Ok(result.output)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
