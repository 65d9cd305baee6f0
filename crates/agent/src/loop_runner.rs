//! The agent loop: drives one run from user input to final answer.
//!
//! ```text
//! SEED → REQUEST → ACCUMULATE → FINALIZE → DECIDE ─┬─ DISPATCH → REQUEST
//!                  (streaming)                      └─ DONE
//! ```
//!
//! A run ends naturally on the first turn whose assistant message requests
//! no tools. It ends with an [`AgentError`] when the provider fails, a turn
//! exceeds its time budget, the turn cap is hit, or the run is cancelled.

use std::sync::Arc;
use std::time::Duration;

use agentflux_config::AppConfig;
use agentflux_core::error::{AgentError, ProviderError};
use agentflux_core::event::AgentEvent;
use agentflux_core::message::{Conversation, Message};
use agentflux_core::provider::{Provider, ProviderRequest};
use agentflux_core::tool::ToolRegistry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accumulator::{FinalizedTurn, StreamAccumulator};
use crate::dispatcher::ToolDispatcher;
use crate::sink::EventSink;

/// The result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The full conversation after the run; feed it into the next run.
    pub conversation: Conversation,

    /// Every event emitted during the run, in order.
    pub events: Vec<AgentEvent>,

    /// Number of model turns taken.
    pub turns: u32,
}

impl RunOutcome {
    /// Text of the final assistant message.
    pub fn answer(&self) -> &str {
        self.conversation.last_answer().unwrap_or_default()
    }
}

/// A run executing in the background.
pub struct RunHandle {
    /// Live events, in emission order. Closed when the run ends.
    pub events: mpsc::Receiver<AgentEvent>,

    /// Resolves to the run's result once every event has been sent.
    pub result: JoinHandle<Result<RunOutcome, AgentError>>,

    /// Cancels the run.
    pub cancel: CancellationToken,
}

/// The core agent loop that orchestrates LLM calls and tool execution.
#[derive(Clone)]
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry, wrapped by the dispatcher
    dispatcher: ToolDispatcher,

    /// System prompt used to seed new conversations
    system_prompt: String,

    /// Stream responses (true) or request single-shot completions
    streaming: bool,

    /// Maximum model turns per run (0 = unbounded)
    max_turns: u32,

    /// Time budget for one turn's request and stream
    turn_timeout: Option<Duration>,
}

impl AgentLoop {
    /// Create a new agent loop with default settings.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            dispatcher: ToolDispatcher::new(tools),
            system_prompt: "You are a helpful assistant.".into(),
            streaming: true,
            max_turns: 25,
            turn_timeout: None,
        }
    }

    /// Create an agent loop configured from the application config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        let agent = &config.agent;
        let mut this = Self::new(provider, &config.model, tools)
            .with_temperature(config.temperature)
            .with_system_prompt(&agent.system_prompt)
            .with_streaming(agent.streaming)
            .with_max_turns(agent.max_turns)
            .with_turn_timeout(Duration::from_secs(agent.turn_timeout_secs))
            .with_tool_timeout(Duration::from_secs(agent.tool_timeout_secs));
        if let Some(max) = config.max_tokens {
            this = this.with_max_tokens(max);
        }
        this
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Choose streaming or single-shot completions.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Set the maximum number of model turns per run. 0 disables the cap.
    pub fn with_max_turns(mut self, max: u32) -> Self {
        self.max_turns = max;
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher = self.dispatcher.with_tool_timeout(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// Run to completion, collecting events.
    ///
    /// `prior` is the conversation returned by an earlier run; `None`
    /// starts a new conversation with the system prompt.
    pub async fn run(
        &self,
        user_input: &str,
        prior: Option<Conversation>,
    ) -> Result<RunOutcome, AgentError> {
        self.run_with(user_input, prior, EventSink::new(), &CancellationToken::new())
            .await
    }

    /// Run in a background task, streaming events through a channel.
    pub fn run_stream(&self, user_input: impl Into<String>, prior: Option<Conversation>) -> RunHandle {
        let (tx, rx) = mpsc::channel(128);
        let cancel = CancellationToken::new();

        let agent = self.clone();
        let user_input = user_input.into();
        let token = cancel.clone();
        let result = tokio::spawn(async move {
            agent
                .run_with(&user_input, prior, EventSink::forwarding(tx), &token)
                .await
        });

        RunHandle {
            events: rx,
            result,
            cancel,
        }
    }

    /// Run with an explicit event sink and cancellation token.
    pub async fn run_with(
        &self,
        user_input: &str,
        prior: Option<Conversation>,
        mut sink: EventSink,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, AgentError> {
        // ── SEED ──
        let mut conversation = match prior {
            Some(conversation) if !conversation.is_empty() => conversation,
            _ => Conversation::from_messages(vec![Message::system(&self.system_prompt)]),
        };
        conversation.push(Message::user(user_input));

        info!(
            model = %self.model,
            messages = conversation.len(),
            streaming = self.streaming,
            "Starting agent run"
        );

        let tool_definitions = self.dispatcher.registry().definitions();
        let mut turn: u32 = 0;

        loop {
            turn += 1;
            if self.max_turns > 0 && turn > self.max_turns {
                warn!(max_turns = self.max_turns, "Turn cap reached, aborting run");
                return Err(AgentError::MaxTurnsExceeded(self.max_turns));
            }

            debug!(turn, messages = conversation.len(), "Agent loop turn");

            // ── REQUEST + ACCUMULATE + FINALIZE ──
            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
                stream: self.streaming,
            };

            let finalized = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                result = self.timed_turn(turn, request, &mut sink) => result?,
            };

            let tool_calls = finalized.tool_calls;
            conversation.push(finalized.message);

            // ── DECIDE ──
            if tool_calls.is_empty() {
                info!(turn, "Agent run complete");
                return Ok(RunOutcome {
                    conversation,
                    events: sink.into_events(),
                    turns: turn,
                });
            }

            // ── DISPATCH ──
            debug!(turn, tool_count = tool_calls.len(), "Dispatching tool calls");
            let outcomes = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                outcomes = self.dispatcher.dispatch(&tool_calls, &mut sink) => outcomes,
            };

            for outcome in &outcomes {
                conversation.push(outcome.to_message());
            }
        }
    }

    async fn timed_turn(
        &self,
        turn: u32,
        request: ProviderRequest,
        sink: &mut EventSink,
    ) -> Result<FinalizedTurn, AgentError> {
        match self.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, self.turn(request, sink))
                .await
                .map_err(|_| {
                    warn!(turn, timeout_ms = limit.as_millis() as u64, "Turn timed out");
                    AgentError::TurnTimeout {
                        turn,
                        timeout: limit,
                    }
                })?,
            None => self.turn(request, sink).await,
        }
    }

    /// One model exchange: request, then accumulate (streaming) or take
    /// the whole message (single-shot).
    async fn turn(
        &self,
        request: ProviderRequest,
        sink: &mut EventSink,
    ) -> Result<FinalizedTurn, AgentError> {
        if !self.streaming {
            let response = self.provider.complete(request).await?;
            let message = response.message;

            if let Some(reasoning) = message.reasoning_content.as_deref().filter(|r| !r.is_empty()) {
                sink.emit(AgentEvent::thinking(reasoning)).await;
            }
            if !message.content.is_empty() {
                sink.emit(AgentEvent::answer(&message.content)).await;
            }
            return Ok(FinalizedTurn::from_message(message));
        }

        let mut deltas = self.provider.stream(request).await?;
        let mut accumulator = StreamAccumulator::new();

        while let Some(delta) = deltas.recv().await {
            let delta = delta?;
            let events = accumulator.accumulate(&delta);
            sink.emit_all(events).await;
            if delta.done {
                return Ok(accumulator.finalize());
            }
        }

        Err(ProviderError::StreamInterrupted("stream ended without an end-of-stream marker".into()).into())
    }
}
