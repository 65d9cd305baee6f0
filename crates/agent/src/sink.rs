//! Event sink for one run: records every event and optionally forwards
//! it to a live subscriber.

use agentflux_core::event::AgentEvent;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct EventSink {
    events: Vec<AgentEvent>,
    tx: Option<mpsc::Sender<AgentEvent>>,
}

impl EventSink {
    /// A sink that only records.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records and forwards to `tx`.
    pub fn forwarding(tx: mpsc::Sender<AgentEvent>) -> Self {
        Self {
            events: Vec::new(),
            tx: Some(tx),
        }
    }

    pub async fn emit(&mut self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event.clone()).await.is_err() {
                // The run still completes so its result can be persisted
                debug!("Event subscriber dropped; continuing without forwarding");
                self.tx = None;
            }
        }
        self.events.push(event);
    }

    pub async fn emit_all(&mut self, events: impl IntoIterator<Item = AgentEvent>) {
        for event in events {
            self.emit(event).await;
        }
    }

    pub fn events(&self) -> &[AgentEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<AgentEvent> {
        self.events
    }
}
