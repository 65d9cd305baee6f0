//! Tool dispatcher — executes one turn's tool calls concurrently.
//!
//! Calls naming an unregistered tool are answered immediately with
//! `"Unknown tool: <name>"` and never run. Every other call gets a
//! `tool_call` event up front (in call order), then all of them run
//! concurrently, each in its own task. `tool_result` events are emitted in
//! completion order; the returned outcomes are in call order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use agentflux_core::error::ToolError;
use agentflux_core::event::AgentEvent;
use agentflux_core::tool::{Tool, ToolCall, ToolOutcome, ToolRegistry, invoke};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::sink::EventSink;

#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    tool_timeout: Option<Duration>,
}

/// Aborts still-running tool tasks if dispatch is abandoned (cancellation).
#[derive(Default)]
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            tool_timeout: None,
        }
    }

    /// Limit how long a single tool execution may take.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run every call and return one outcome per call, in call order.
    pub async fn dispatch(&self, calls: &[ToolCall], sink: &mut EventSink) -> Vec<ToolOutcome> {
        let mut outcomes: Vec<Option<ToolOutcome>> = vec![None; calls.len()];
        let mut resolved: Vec<(usize, Arc<dyn Tool>)> = Vec::with_capacity(calls.len());

        for (slot, call) in calls.iter().enumerate() {
            let tool = (!call.name.is_empty())
                .then(|| self.registry.get(&call.name))
                .flatten();

            match tool {
                Some(tool) => {
                    sink.emit(AgentEvent::from(call)).await;
                    resolved.push((slot, tool));
                }
                None => {
                    warn!(tool = %call.name, call_id = %call.id, "Model requested unknown tool");
                    let outcome = ToolOutcome::unknown_tool(call);
                    sink.emit(AgentEvent::from(&outcome)).await;
                    outcomes[slot] = Some(outcome);
                }
            }
        }

        let mut running = FuturesUnordered::new();
        let mut guard = AbortOnDrop::default();

        for (slot, tool) in resolved {
            let call = calls[slot].clone();
            let handle = tokio::spawn(execute(tool, call, self.tool_timeout));
            guard.0.push(handle.abort_handle());
            running.push(async move { (slot, handle.await) });
        }

        while let Some((slot, joined)) = running.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                warn!(tool = %calls[slot].name, call_id = %calls[slot].id, error = %e, "Tool task failed");
                ToolOutcome::execution_error(&calls[slot], format!("tool task failed: {e}"))
            });
            sink.emit(AgentEvent::from(&outcome)).await;
            outcomes[slot] = Some(outcome);
        }

        outcomes.into_iter().flatten().collect()
    }
}

async fn execute(tool: Arc<dyn Tool>, call: ToolCall, timeout: Option<Duration>) -> ToolOutcome {
    let started = Instant::now();
    debug!(tool = %call.name, call_id = %call.id, "Executing tool");

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, invoke(tool.as_ref(), &call)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    timeout_ms = limit.as_millis() as u64,
                    "Tool timed out"
                );
                ToolOutcome::execution_error(
                    &call,
                    ToolError::Timeout {
                        tool_name: call.name.clone(),
                        timeout: limit,
                    },
                )
            }
        },
        None => invoke(tool.as_ref(), &call).await,
    };

    debug!(
        tool = %call.name,
        call_id = %call.id,
        success = outcome.success,
        duration_ms = started.elapsed().as_millis() as u64,
        "Tool finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{EchoTool, FailingTool, PanickingTool};

    fn call(id: &str, name: &str, args: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            raw_arguments: args.into(),
        }
    }

    fn registry(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn unknown_tool_never_executes() {
        let echo = Arc::new(EchoTool::new("search"));
        let dispatcher = ToolDispatcher::new(registry(vec![echo.clone() as Arc<dyn Tool>]));
        let mut sink = EventSink::new();

        let outcomes = dispatcher
            .dispatch(&[call("call-9", "foo", "{}")], &mut sink)
            .await;

        assert_eq!(echo.runs(), 0);
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert_eq!(outcomes[0].output, "Unknown tool: foo");
        assert_eq!(
            sink.events(),
            &[AgentEvent::ToolResult {
                id: "call-9".into(),
                tool_name: "foo".into(),
                tool_output: "Unknown tool: foo".into(),
                success: false,
            }]
        );
    }

    #[tokio::test]
    async fn empty_name_is_unknown() {
        let dispatcher = ToolDispatcher::new(registry(vec![Arc::new(EchoTool::new("search")) as Arc<dyn Tool>]));
        let mut sink = EventSink::new();
        let outcomes = dispatcher.dispatch(&[call("c0", "", "{}")], &mut sink).await;
        assert_eq!(outcomes[0].output, "Unknown tool: ");
        assert!(!outcomes[0].success);
    }

    #[tokio::test]
    async fn tool_call_events_precede_results_in_call_order() {
        let dispatcher = ToolDispatcher::new(registry(vec![
            Arc::new(EchoTool::slow("search", Duration::from_millis(50))) as Arc<dyn Tool>,
            Arc::new(EchoTool::new("web_scraper")),
        ]));
        let mut sink = EventSink::new();

        let outcomes = dispatcher
            .dispatch(
                &[
                    call("c0", "search", r#"{"text":"a"}"#),
                    call("c1", "web_scraper", r#"{"text":"b"}"#),
                ],
                &mut sink,
            )
            .await;

        let events = sink.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].event_type(), "tool_call");
        assert_eq!(events[0].call_id(), Some("c0"));
        assert_eq!(events[1].event_type(), "tool_call");
        assert_eq!(events[1].call_id(), Some("c1"));
        // Results arrive in completion order; the fast tool finishes first
        assert_eq!(events[2].call_id(), Some("c1"));
        assert_eq!(events[3].call_id(), Some("c0"));

        // Outcomes stay in call order
        assert_eq!(outcomes[0].call_id, "c0");
        assert_eq!(outcomes[0].output, "search: a");
        assert_eq!(outcomes[1].call_id, "c1");
        assert_eq!(outcomes[1].output, "web_scraper: b");
    }

    #[tokio::test]
    async fn calls_run_concurrently() {
        let dispatcher = ToolDispatcher::new(registry(vec![
            Arc::new(EchoTool::slow("a", Duration::from_millis(200))) as Arc<dyn Tool>,
            Arc::new(EchoTool::slow("b", Duration::from_millis(200))),
            Arc::new(EchoTool::slow("c", Duration::from_millis(200))),
        ]));
        let mut sink = EventSink::new();

        let started = Instant::now();
        let outcomes = dispatcher
            .dispatch(&[call("1", "a", ""), call("2", "b", ""), call("3", "c", "")], &mut sink)
            .await;

        assert!(outcomes.iter().all(|o| o.success));
        assert!(started.elapsed() < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn failure_is_isolated_from_siblings() {
        let dispatcher = ToolDispatcher::new(registry(vec![
            Arc::new(EchoTool::new("search")) as Arc<dyn Tool>,
            Arc::new(FailingTool::new("code_interpret", "sandbox unavailable")),
        ]));
        let mut sink = EventSink::new();

        let outcomes = dispatcher
            .dispatch(
                &[
                    call("c0", "code_interpret", r#"{"code":"1/0"}"#),
                    call("c1", "search", r#"{"text":"ok"}"#),
                ],
                &mut sink,
            )
            .await;

        assert!(!outcomes[0].success);
        assert_eq!(
            outcomes[0].output,
            "Error executing tool code_interpret: Tool execution failed: code_interpret — sandbox unavailable"
        );
        assert!(outcomes[1].success);
        assert_eq!(outcomes[1].output, "search: ok");
    }

    #[tokio::test]
    async fn panicking_tool_becomes_failure() {
        let dispatcher = ToolDispatcher::new(registry(vec![
            Arc::new(PanickingTool) as Arc<dyn Tool>,
            Arc::new(EchoTool::new("search")),
        ]));
        let mut sink = EventSink::new();

        let outcomes = dispatcher
            .dispatch(&[call("c0", "panicky", "{}"), call("c1", "search", "{}")], &mut sink)
            .await;

        assert!(!outcomes[0].success);
        assert!(outcomes[0].output.starts_with("Error executing tool panicky: "));
        assert!(outcomes[1].success);
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let dispatcher = ToolDispatcher::new(registry(vec![Arc::new(EchoTool::slow(
            "search",
            Duration::from_secs(30),
        )) as Arc<dyn Tool>]))
        .with_tool_timeout(Duration::from_millis(50));
        let mut sink = EventSink::new();

        let outcomes = dispatcher.dispatch(&[call("c0", "search", "{}")], &mut sink).await;

        assert!(!outcomes[0].success);
        assert_eq!(
            outcomes[0].output,
            "Error executing tool search: Tool timed out: search after 50ms"
        );
    }

    #[tokio::test]
    async fn mixed_known_and_unknown_keep_call_order() {
        let dispatcher = ToolDispatcher::new(registry(vec![Arc::new(EchoTool::new("search")) as Arc<dyn Tool>]));
        let mut sink = EventSink::new();

        let outcomes = dispatcher
            .dispatch(
                &[
                    call("c0", "search", "{}"),
                    call("c1", "nope", "{}"),
                    call("c2", "search", "{}"),
                ],
                &mut sink,
            )
            .await;

        let ids: Vec<&str> = outcomes.iter().map(|o| o.call_id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c1", "c2"]);

        let types: Vec<&str> = sink.events().iter().map(|e| e.event_type()).collect();
        assert_eq!(types[..3], ["tool_call", "tool_result", "tool_call"]);
        assert_eq!(sink.events()[1].call_id(), Some("c1"));
    }
}
