//! Domain event system: decoupled observation of flow invocations.
//!
//! The flow engine publishes events as invocations progress. Subscribers
//! (the CLI's verbose mode, tests, future metrics) react without the engine
//! knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A flow invocation passed input validation and started executing
    FlowStarted {
        invocation_id: String,
        flow: String,
        timestamp: DateTime<Utc>,
    },

    /// A flow invocation returned validated output
    FlowCompleted {
        invocation_id: String,
        flow: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A flow invocation failed
    FlowFailed {
        invocation_id: String,
        flow: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed (directly by a flow body or by the model)
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The model answered one round
    ModelResponded {
        model: String,
        round: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ToolExecuted {
            tool_name: "getSystemStatus".into(),
            success: true,
            duration_ms: 3,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted { tool_name, success, .. } => {
                assert_eq!(tool_name, "getSystemStatus");
                assert!(success);
            }
            _ => panic!("Expected ToolExecuted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::FlowFailed {
            invocation_id: "inv".into(),
            flow: "weatherSummaryFlow".into(),
            error: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }

    #[tokio::test]
    async fn cloned_bus_shares_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.clone().publish(DomainEvent::FlowStarted {
            invocation_id: "inv-1".into(),
            flow: "dailyBriefingFlow".into(),
            timestamp: Utc::now(),
        });
        assert!(matches!(rx.recv().await.unwrap().as_ref(), DomainEvent::FlowStarted { .. }));
    }
}
