//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenRouter, OpenAI, vLLM, Together AI, and any endpoint
//! exposing `/chat/completions` in the OpenAI wire format.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Tool use / function calling
//! - Reasoning text (`reasoning_content` or OpenRouter's `reasoning`)
//!
//! Streaming deltas are forwarded as-is. Tool-call fragments keep their
//! stream index; reassembly happens in the agent's accumulator.

use async_trait::async_trait;
use agentflux_core::error::ProviderError;
use agentflux_core::message::{Message, MessageToolCall};
use agentflux_core::provider::*;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", OPENROUTER_BASE_URL, api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                // Assistant turns that only call tools carry no content
                let content = if m.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(m.content.clone())
                };

                ApiMessage {
                    role: m.role.as_str().into(),
                    content,
                    reasoning_content: m.reasoning_content.clone(),
                    reasoning: None,
                    tool_calls,
                    tool_call_id: m.tool_call_id.clone(),
                    name: m.tool_name.clone(),
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    async fn send(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> std::result::Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        check_status(response).await
    }
}

/// Map non-success HTTP statuses to provider errors.
async fn check_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if !(200..300).contains(&status) {
        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Provider returned error");
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}

#[async_trait]
impl agentflux_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self.send(&body, false).await?;
        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        parse_api_response(api_response)
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<DeltaReceiver, ProviderError> {
        let body = Self::request_body(&request, true);
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self.send(&body, true).await?;

        let (tx, rx) = mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and forward deltas
        tokio::spawn(async move {
            forward_sse(response.bytes_stream(), tx, &provider_name).await;
        });

        Ok(rx)
    }
}

/// Forward the deltas of an SSE body until `[DONE]`, an error, or the end
/// of the body.
///
/// An in-band error chunk or a `finish_reason` of `"error"` is sent as an
/// `Err` and ends the stream. A body that ends before `[DONE]` ends cleanly
/// only if some choice already reported a finish reason; otherwise it is
/// `StreamInterrupted`.
async fn forward_sse<S, B, E>(
    mut byte_stream: S,
    tx: mpsc::Sender<std::result::Result<StreamDelta, ProviderError>>,
    provider_name: &str,
) where
    S: futures::Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut buffer = SseLineBuffer::default();
    let mut usage = None;
    let mut finished = false;

    while let Some(chunk_result) = byte_stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                    .await;
                return;
            }
        };

        for line in buffer.push(bytes.as_ref()) {
            match parse_sse_line(&line) {
                SseLine::Skip => {}
                SseLine::Done => {
                    let _ = tx.send(Ok(StreamDelta { usage, ..StreamDelta::done() })).await;
                    return;
                }
                SseLine::Chunk(chunk) => {
                    if let Some(err) = chunk_error(&chunk) {
                        warn!(
                            provider = %provider_name,
                            error = %err,
                            "Provider reported an error mid-stream"
                        );
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                    if let Some(u) = chunk.usage.as_ref() {
                        usage = Some(u.into());
                    }
                    finished |= chunk.choices.iter().any(|c| c.finish_reason.is_some());
                    for delta in chunk_to_deltas(chunk) {
                        if tx.send(Ok(delta)).await.is_err() {
                            return; // receiver dropped
                        }
                    }
                }
                SseLine::Invalid { data, error } => {
                    trace!(
                        provider = %provider_name,
                        data = %data,
                        error = %error,
                        "Ignoring unparseable SSE chunk"
                    );
                }
            }
        }
    }

    if finished {
        let _ = tx.send(Ok(StreamDelta { usage, ..StreamDelta::done() })).await;
    } else {
        let _ = tx
            .send(Err(ProviderError::StreamInterrupted(
                "stream ended before [DONE]".into(),
            )))
            .await;
    }
}

/// The error carried by a chunk, if the provider reported one in-band.
fn chunk_error(chunk: &StreamResponse) -> Option<ProviderError> {
    if let Some(err) = &chunk.error {
        let message = err
            .message
            .clone()
            .unwrap_or_else(|| "provider reported an error".into());
        return Some(match err.code.as_ref().and_then(|c| c.as_u64()) {
            Some(code) => ProviderError::ApiError {
                status_code: u16::try_from(code).unwrap_or(u16::MAX),
                message,
            },
            None => ProviderError::StreamInterrupted(message),
        });
    }
    chunk
        .choices
        .iter()
        .any(|c| c.finish_reason.as_deref() == Some("error"))
        .then(|| ProviderError::StreamInterrupted("provider finished with an error".into()))
}

/// Convert a non-streaming API response into a provider response.
fn parse_api_response(
    api_response: ApiResponse,
) -> std::result::Result<ProviderResponse, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

    let tool_calls: Vec<MessageToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| MessageToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    let reasoning = choice
        .message
        .reasoning_content
        .or(choice.message.reasoning)
        .unwrap_or_default();

    let message = Message::assistant(choice.message.content.unwrap_or_default())
        .with_reasoning(reasoning)
    .with_tool_calls(tool_calls);

    Ok(ProviderResponse {
        message,
        usage: api_response.usage.as_ref().map(Usage::from),
        model: api_response.model,
    })
}

/// Split one SSE chunk into stream deltas, one per choice delta.
fn chunk_to_deltas(chunk: StreamResponse) -> Vec<StreamDelta> {
    chunk
        .choices
        .into_iter()
        .filter_map(|choice| {
            let d = choice.delta;
            let delta = StreamDelta {
                reasoning: d.reasoning_content.or(d.reasoning).filter(|r| !r.is_empty()),
                content: d.content.filter(|c| !c.is_empty()),
                tool_calls: d
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|tc| {
                        let (name, arguments) = match tc.function {
                            Some(f) => (f.name, f.arguments),
                            None => (None, None),
                        };
                        ToolCallFragment {
                            index: tc.index,
                            id: tc.id,
                            name,
                            arguments,
                        }
                    })
                    .collect(),
                done: false,
                usage: None,
            };
            let empty =
                delta.reasoning.is_none() && delta.content.is_none() && delta.tool_calls.is_empty();
            (!empty).then_some(delta)
        })
        .collect()
}

/// Splits an SSE byte stream into complete lines.
///
/// Bytes are held until a newline arrives, so a UTF-8 sequence split
/// across network reads is decoded whole.
#[derive(Default)]
struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }
}

enum SseLine {
    Skip,
    Done,
    Chunk(StreamResponse),
    Invalid { data: String, error: String },
}

fn parse_sse_line(line: &str) -> SseLine {
    // Skip empty lines, SSE comments (OpenRouter keep-alives) and non-data fields
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return SseLine::Skip;
    }
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamResponse>(data) {
        Ok(chunk) => SseLine::Chunk(chunk),
        Err(e) => SseLine::Invalid {
            data: data.to_string(),
            error: e.to_string(),
        },
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reasoning_content: Option<String>,
    #[serde(default, skip_serializing)]
    reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<&ApiUsage> for Usage {
    fn from(u: &ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    /// OpenRouter reports failures after the stream has started in-band
    #[serde(default)]
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: ApiStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta — arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
