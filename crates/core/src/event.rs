//! Agent progress events.
//!
//! The ordered sequence of events emitted during a run is the audit trail
//! of what happened. Each event serializes as a JSON object with a `type`
//! discriminant so it can be sent as one transport frame (SSE, WebSocket)
//! or stored alongside the conversation.

use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolOutcome};

/// Events emitted by the agent loop.
///
/// - `thinking`    — reasoning text from the model
/// - `answer`      — answer text from the model
/// - `tool_call`   — the agent is about to invoke a tool
/// - `tool_result` — a tool invocation finished (or was rejected)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Thinking {
        content: String,
    },

    Answer {
        content: String,
    },

    ToolCall {
        id: String,
        tool_name: String,
        tool_input: String,
    },

    ToolResult {
        id: String,
        tool_name: String,
        tool_output: String,
        success: bool,
    },
}

impl AgentEvent {
    pub fn thinking(content: impl Into<String>) -> Self {
        Self::Thinking {
            content: content.into(),
        }
    }

    pub fn answer(content: impl Into<String>) -> Self {
        Self::Answer {
            content: content.into(),
        }
    }

    /// Event type name, also used as the SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Answer { .. } => "answer",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
        }
    }

    /// The tool call id this event correlates with, if any.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::ToolCall { id, .. } | Self::ToolResult { id, .. } => Some(id),
            Self::Thinking { .. } | Self::Answer { .. } => None,
        }
    }
}

impl From<&ToolCall> for AgentEvent {
    fn from(call: &ToolCall) -> Self {
        Self::ToolCall {
            id: call.id.clone(),
            tool_name: call.name.clone(),
            tool_input: call.raw_arguments.clone(),
        }
    }
}

impl From<&ToolOutcome> for AgentEvent {
    fn from(outcome: &ToolOutcome) -> Self {
        Self::ToolResult {
            id: outcome.call_id.clone(),
            tool_name: outcome.tool_name.clone(),
            tool_output: outcome.output.clone(),
            success: outcome.success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_answer() {
        let event = AgentEvent::answer("Hello");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"answer","content":"Hello"}"#);
    }

    #[test]
    fn event_serialization_tool_call() {
        let event = AgentEvent::ToolCall {
            id: "call_1".into(),
            tool_name: "search".into(),
            tool_input: r#"{"query":"rust"}"#.into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
        assert!(json.contains(r#""tool_name":"search""#));
        // Input stays an opaque string, not nested JSON
        assert!(json.contains(r#""tool_input":"{\"query\":\"rust\"}""#));
    }

    #[test]
    fn event_serialization_tool_result() {
        let event = AgentEvent::ToolResult {
            id: "call-9".into(),
            tool_name: "foo".into(),
            tool_output: "Unknown tool: foo".into(),
            success: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_result""#));
        assert!(json.contains(r#""success":false"#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(AgentEvent::thinking("x").event_type(), "thinking");
        assert_eq!(AgentEvent::answer("x").event_type(), "answer");
        let call = ToolCall {
            id: "a".into(),
            name: "b".into(),
            raw_arguments: "{}".into(),
        };
        assert_eq!(AgentEvent::from(&call).event_type(), "tool_call");
        let outcome = ToolOutcome::success(&call, "ok");
        assert_eq!(AgentEvent::from(&outcome).event_type(), "tool_result");
        assert_eq!(AgentEvent::from(&outcome).call_id(), Some("a"));
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"thinking","content":"hmm"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::Thinking { content } => assert_eq!(content, "hmm"),
            _ => panic!("Wrong variant"),
        }
    }
}
