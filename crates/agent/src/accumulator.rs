//! Stream delta accumulator.
//!
//! Rebuilds one complete assistant turn from the partial deltas of a
//! streaming completion. Text fragments are forwarded as events the moment
//! they arrive; tool-call fragments are buffered per stream `index` until
//! the stream ends.

use std::collections::BTreeMap;

use agentflux_core::event::AgentEvent;
use agentflux_core::message::{Message, MessageToolCall};
use agentflux_core::provider::{StreamDelta, ToolCallFragment};
use agentflux_core::tool::ToolCall;

/// Buffer for the fragments of one tool call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn apply(&mut self, fragment: &ToolCallFragment) {
        if let Some(id) = fragment.id.as_deref().filter(|s| !s.is_empty()) {
            self.id = id.to_string();
        }
        if let Some(name) = fragment.name.as_deref().filter(|s| !s.is_empty()) {
            self.name = name.to_string();
        }
        if let Some(arguments) = &fragment.arguments {
            self.arguments.push_str(arguments);
        }
    }
}

/// One finished assistant turn: the message to append to the conversation
/// and the tool calls it requested, in index order.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedTurn {
    pub message: Message,
    pub tool_calls: Vec<ToolCall>,
}

impl FinalizedTurn {
    /// Build a turn from a complete (non-streamed) assistant message.
    pub fn from_message(message: Message) -> Self {
        let tool_calls = message.tool_calls.iter().cloned().map(ToolCall::from).collect();
        Self {
            message,
            tool_calls,
        }
    }
}

/// Accumulates the deltas of one streamed turn.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    reasoning: String,
    content: String,
    // Keyed by stream index; ids may only arrive on the first fragment
    tool_calls: BTreeMap<u32, PartialToolCall>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta into the buffers and return the events it produces.
    pub fn accumulate(&mut self, delta: &StreamDelta) -> Vec<AgentEvent> {
        let mut events = Vec::new();

        if let Some(reasoning) = delta.reasoning.as_deref().filter(|s| !s.is_empty()) {
            self.reasoning.push_str(reasoning);
            events.push(AgentEvent::thinking(reasoning));
        }

        if let Some(content) = delta.content.as_deref().filter(|s| !s.is_empty()) {
            self.content.push_str(content);
            events.push(AgentEvent::answer(content));
        }

        for fragment in &delta.tool_calls {
            self.tool_calls
                .entry(fragment.index)
                .or_default()
                .apply(fragment);
        }

        events
    }

    /// Whether any tool-call fragment has been seen so far.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Produce the assistant message and the tool calls in ascending index
    /// order. Calls with an empty name are kept; the dispatcher rejects them.
    pub fn finalize(self) -> FinalizedTurn {
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_values()
            .map(|partial| ToolCall {
                id: partial.id,
                name: partial.name,
                raw_arguments: partial.arguments,
            })
            .collect();

        let message = Message::assistant(self.content)
            .with_reasoning(self.reasoning)
            .with_tool_calls(tool_calls.iter().map(MessageToolCall::from).collect());

        FinalizedTurn {
            message,
            tool_calls,
        }
    }
}
