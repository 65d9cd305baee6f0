//! Shared test helpers: scripted providers and mock tools.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agentflux_core::error::{ProviderError, ToolError};
use agentflux_core::message::{Message, MessageToolCall};
use agentflux_core::provider::{
    DeltaReceiver, Provider, ProviderRequest, ProviderResponse, StreamDelta, ToolCallFragment,
    Usage,
};
use agentflux_core::tool::{Tool, parse_arguments};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

/// One scripted provider turn.
#[derive(Clone)]
pub enum Script {
    /// A complete response (replayed as deltas when streaming).
    Respond(ProviderResponse),
    /// Raw deltas for a streamed turn, sent exactly as given.
    Deltas(Vec<Result<StreamDelta, ProviderError>>),
    /// The request itself fails.
    Fail(ProviderError),
    /// Never answers.
    Hang,
}

/// A mock provider that plays back a script, one entry per call, and
/// records every request it receives.
///
/// Panics if more calls are made than entries provided.
pub struct ScriptedProvider {
    script: Mutex<Vec<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ProviderRequest) -> Script {
        let mut requests = self.requests.lock().unwrap();
        let script = self.script.lock().unwrap();
        let call = requests.len();
        requests.push(request);
        match script.get(call) {
            Some(entry) => entry.clone(),
            None => panic!(
                "ScriptedProvider: no more responses (call #{call}, have {})",
                script.len()
            ),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next(request) {
            Script::Respond(response) => Ok(response),
            Script::Fail(error) => Err(error),
            Script::Hang => std::future::pending().await,
            Script::Deltas(_) => panic!("ScriptedProvider: delta script used in complete mode"),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<DeltaReceiver, ProviderError> {
        let deltas = match self.next(request) {
            Script::Respond(response) => agentflux_core::provider::response_to_deltas(response)
                .into_iter()
                .map(Ok)
                .collect(),
            Script::Deltas(deltas) => deltas,
            Script::Fail(error) => return Err(error),
            Script::Hang => std::future::pending().await,
        };

        let (tx, rx) = mpsc::channel(deltas.len().max(1));
        for delta in deltas {
            tx.send(delta).await.unwrap();
        }
        Ok(rx)
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// Create a simple text response (no tool calls).
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(thought).with_tool_calls(tool_calls),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.to_string(),
    }
}

/// A streamed tool-call fragment.
pub fn fragment(index: u32, id: Option<&str>, name: Option<&str>, args: &str) -> StreamDelta {
    StreamDelta::tool_call(ToolCallFragment {
        index,
        id: id.map(Into::into),
        name: name.map(Into::into),
        arguments: Some(args.into()),
    })
}

// ── Mock tools ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TextInput {
    #[serde(default)]
    text: String,
}

/// Returns its `text` argument after an optional delay, counting runs.
pub struct EchoTool {
    name: String,
    delay: Duration,
    runs: AtomicUsize,
}

impl EchoTool {
    pub fn new(name: &str) -> Self {
        Self::slow(name, Duration::ZERO)
    }

    pub fn slow(name: &str, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Echoes back the input"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } }
        })
    }

    async fn execute(&self, _call_id: &str, arguments: &str) -> Result<String, ToolError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let input: TextInput = parse_arguments(arguments)?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(format!("{}: {}", self.name, input.text))
    }
}

/// Always fails with the given message.
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    async fn execute(&self, _call_id: &str, _arguments: &str) -> Result<String, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason: self.message.clone(),
        })
    }
}

/// Panics when executed.
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "panicky"
    }

    fn description(&self) -> &str {
        "Panics"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    async fn execute(&self, _call_id: &str, _arguments: &str) -> Result<String, ToolError> {
        panic!("tool blew up");
    }
}
