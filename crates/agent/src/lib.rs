//! The agent orchestration loop for AgentFlux.
//!
//! 1. **Seed** the conversation (system prompt on first use, then the user message)
//! 2. **Request** a completion with the full history and tool schemas
//! 3. **Accumulate** streamed deltas into one assistant turn, forwarding
//!    `thinking` / `answer` events as they arrive
//! 4. **Dispatch** any requested tool calls concurrently and append their results
//! 5. Loop back to step 2 until a turn requests no tools
//!
//! Progress is reported as [`AgentEvent`]s; the final conversation is handed
//! back to the caller so it can be persisted and used to resume.

pub mod accumulator;
pub mod dispatcher;
pub mod loop_runner;
pub mod sink;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use accumulator::{FinalizedTurn, StreamAccumulator};
pub use agentflux_core::event::AgentEvent;
pub use dispatcher::ToolDispatcher;
pub use loop_runner::{AgentLoop, RunHandle, RunOutcome};
pub use sink::EventSink;
pub use tokio_util::sync::CancellationToken;
