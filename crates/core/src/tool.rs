//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! search the web, extract page content, run code, etc. Each tool receives
//! only its own raw arguments; it never sees the conversation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::message::{Message, MessageToolCall};
use crate::provider::ToolDefinition;

/// A finalized request to execute a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute (may be empty if the model never sent one)
    pub name: String,

    /// Arguments exactly as the model produced them
    pub raw_arguments: String,
}

impl From<&ToolCall> for MessageToolCall {
    fn from(call: &ToolCall) -> Self {
        MessageToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.raw_arguments.clone(),
        }
    }
}

impl From<MessageToolCall> for ToolCall {
    fn from(call: MessageToolCall) -> Self {
        ToolCall {
            id: call.id,
            name: call.name,
            raw_arguments: call.arguments,
        }
    }
}

/// The result of invoking a tool, after errors have been folded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// The call ID this result is for
    pub call_id: String,

    /// The tool that produced it
    pub tool_name: String,

    /// Output text, or a human-readable error message on failure
    pub output: String,

    /// Whether the tool executed successfully
    pub success: bool,
}

impl ToolOutcome {
    pub fn success(call: &ToolCall, output: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            output: output.into(),
            success: true,
        }
    }

    pub fn failure(call: &ToolCall, output: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            output: output.into(),
            success: false,
        }
    }

    /// The failure reported when a call names a tool that isn't registered.
    pub fn unknown_tool(call: &ToolCall) -> Self {
        Self::failure(call, format!("Unknown tool: {}", call.name))
    }

    /// The failure reported when a registered tool errors out.
    pub fn execution_error(call: &ToolCall, error: impl std::fmt::Display) -> Self {
        Self::failure(
            call,
            format!("Error executing tool {}: {}", call.name, error),
        )
    }

    /// The tool-role message that reports this outcome back to the model.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.call_id, &self.tool_name, &self.output)
    }
}

/// The core Tool trait.
///
/// Each tool (search, web_scraper, code_interpret, ...) implements this
/// trait and is registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the raw argument string from the model.
    async fn execute(&self, call_id: &str, arguments: &str) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Invoke a tool, converting any failure into a failed [`ToolOutcome`].
///
/// This is the interface boundary: nothing a tool does can escape as an
/// error from here.
pub async fn invoke(tool: &dyn Tool, call: &ToolCall) -> ToolOutcome {
    match tool.execute(&call.id, &call.raw_arguments).await {
        Ok(output) => ToolOutcome::success(call, output),
        Err(e) => {
            tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
            ToolOutcome::execution_error(call, e)
        }
    }
}

/// Parse a raw argument string into a typed input.
///
/// An empty string is treated as an empty JSON object, which some models
/// send for tools without parameters.
pub fn parse_arguments<T: DeserializeOwned>(raw: &str) -> std::result::Result<T, ToolError> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// A registry of available tools, keyed by name.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Resolve the tool named by each call the LLM makes
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
