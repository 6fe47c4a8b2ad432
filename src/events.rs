//! Decoupled event bus for crew progress.
//!
//! The engine and orchestrator emit events via [`EventBus::emit`]; the CLI
//! (or any other listener) subscribes via [`EventBus::subscribe`]. Built on
//! [`tokio::sync::broadcast`] so multiple listeners can react independently.

use tokio::sync::broadcast;

/// Events that flow through the system.
#[derive(Debug, Clone)]
pub enum Event {
    /// A task is about to run (zero-based position in the crew).
    TaskStarted {
        index: usize,
        task: String,
        agent: String,
    },
    /// One THINK step produced an action and the tool was observed.
    ToolUsed {
        agent: String,
        iteration: usize,
        tool: String,
        input: String,
        observation: String,
    },
    /// A task produced its output.
    TaskCompleted {
        index: usize,
        task: String,
        agent: String,
        output: String,
    },
    /// The output was kept but the artifact file could not be written.
    ArtifactWriteFailed { task: String, error: String },
}

/// A broadcast channel that any component can emit to or subscribe from.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers.
    /// Returns the number of receivers that will see it.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events. Returns a receiver that yields all
    /// future events (does not replay past ones).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> Event {
        Event::TaskStarted {
            index: 0,
            task: "research".to_string(),
            agent: "Researcher".to_string(),
        }
    }

    #[tokio::test]
    async fn emit_reaches_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(started());

        match rx.recv().await.unwrap() {
            Event::TaskStarted { task, agent, .. } => {
                assert_eq!(task, "research");
                assert_eq!(agent, "Researcher");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(started());

        assert!(matches!(rx1.recv().await.unwrap(), Event::TaskStarted { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), Event::TaskStarted { .. }));
    }

    #[test]
    fn emit_without_subscribers_returns_zero() {
        let bus = EventBus::default();
        assert_eq!(bus.emit(started()), 0);
    }

    #[test]
    fn emit_with_subscriber_returns_count() {
        let bus = EventBus::default();
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.emit(started()), 2);
    }
}
