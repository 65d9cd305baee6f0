//! Provider trait — the abstraction over model-completion backends.
//!
//! A Provider knows how to send a conversation to an LLM and get a response
//! back, either as a complete message or as a stream of partial deltas.
//!
//! Deltas are forwarded raw: tool-call fragments keep their stream `index`
//! and are stitched back together by the agent's accumulator, never by the
//! provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;

/// Receiving half of a streaming completion.
pub type DeltaReceiver = mpsc::Receiver<std::result::Result<StreamDelta, ProviderError>>;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "openai/gpt-oss-120b:exacto")
    pub model: String,

    /// The full conversation history
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message, including any tool calls
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One partial fragment of a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Reasoning ("thinking") text fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Answer text fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Partial tool-call fragments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,

    /// End-of-stream marker
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only on the final delta)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamDelta {
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Self::default()
        }
    }

    /// The explicit end-of-stream signal.
    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

/// A piece of one tool call, identified by its position in the stream.
///
/// `index` is stable for a given call across the whole stream; `id` and
/// `name` usually arrive only on the first fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// The core Provider trait.
///
/// The agent loop calls `complete()` or `stream()` without knowing which
/// backend is being used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of deltas, terminated by a delta
    /// with `done == true`.
    ///
    /// Default implementation calls `complete()` and replays the response
    /// as a short delta sequence.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<DeltaReceiver, ProviderError> {
        let response = self.complete(request).await?;
        let deltas = response_to_deltas(response);
        let (tx, rx) = mpsc::channel(deltas.len().max(1));
        for delta in deltas {
            // Capacity covers every delta, so this never waits.
            let _ = tx.send(Ok(delta)).await;
        }
        Ok(rx)
    }
}

/// Split a complete response into the deltas a streaming backend would
/// have produced for it.
pub fn response_to_deltas(response: ProviderResponse) -> Vec<StreamDelta> {
    let message = response.message;
    let mut deltas = Vec::new();

    if let Some(reasoning) = message.reasoning_content.filter(|r| !r.is_empty()) {
        deltas.push(StreamDelta::reasoning(reasoning));
    }
    if !message.content.is_empty() {
        deltas.push(StreamDelta::content(message.content));
    }
    if !message.tool_calls.is_empty() {
        deltas.push(StreamDelta {
            tool_calls: message
                .tool_calls
                .into_iter()
                .enumerate()
                .map(|(index, tc)| ToolCallFragment {
                    index: index as u32,
                    id: Some(tc.id),
                    name: Some(tc.name),
                    arguments: Some(tc.arguments),
                })
                .collect(),
            ..StreamDelta::default()
        });
    }

    deltas.push(StreamDelta {
        usage: response.usage,
        ..StreamDelta::done()
    });
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageToolCall;

    struct FixedProvider;

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            let message = Message::assistant("Hello")
                .with_reasoning("greeting")
                .with_tool_calls(vec![MessageToolCall {
                    id: "call-1".into(),
                    name: "search".into(),
                    arguments: "{}".into(),
                }]);
            Ok(ProviderResponse {
                message,
                usage: None,
                model: "fixed-model".into(),
            })
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "fixed-model".into(),
            messages: vec![],
            temperature: default_temperature(),
            max_tokens: None,
            tools: vec![],
            stream: true,
        }
    }

    #[test]
    fn provider_request_defaults() {
        let json = r#"{"model":"m","messages":[]}"#;
        let req: ProviderRequest = serde_json::from_str(json).unwrap();
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(!req.stream);
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "search".into(),
            description: "Search the web".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The search query" }
                },
                "required": ["query"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("search"));
        assert!(json.contains("query"));
    }

    #[tokio::test]
    async fn default_stream_replays_complete_response() {
        let mut rx = FixedProvider.stream(request()).await.unwrap();

        let mut deltas = vec![];
        while let Some(delta) = rx.recv().await {
            deltas.push(delta.unwrap());
        }

        assert_eq!(deltas.len(), 4);
        assert_eq!(deltas[0].reasoning.as_deref(), Some("greeting"));
        assert_eq!(deltas[1].content.as_deref(), Some("Hello"));
        assert_eq!(deltas[2].tool_calls[0].index, 0);
        assert_eq!(deltas[2].tool_calls[0].id.as_deref(), Some("call-1"));
        assert!(deltas[3].done);
    }

    #[test]
    fn empty_response_is_just_done() {
        let deltas = response_to_deltas(ProviderResponse {
            message: Message::assistant(""),
            usage: None,
            model: "m".into(),
        });
        assert_eq!(deltas, vec![StreamDelta::done()]);
    }
}
