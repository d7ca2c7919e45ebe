//! Lifecycle event sink.
//!
//! The bus and the agents report what they do as [`BusEvent`] values
//! handed to an [`EventSink`]. The sink is chosen by the driver: the engine
//! uses [`TracingSink`], tests use [`MemorySink`] to assert on the exact
//! sequence of events.

use std::sync::{Mutex, PoisonError};

use relief_types::{AgentId, PredictionId};
use tracing::{debug, info, warn};

/// A structured lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// An agent handed a message to the bus.
    MessageSent {
        /// Sender address.
        from: AgentId,
        /// Recipient address.
        to: AgentId,
        /// Payload tag.
        kind: &'static str,
    },
    /// The bus is invoking the recipient's handler.
    MessageDelivered {
        /// Recipient address.
        to: AgentId,
        /// Payload tag.
        kind: &'static str,
        /// Distance from the originating stimulus (0 for the stimulus).
        hop: u32,
    },
    /// No handler is registered for the recipient.
    Unroutable {
        /// Sender address.
        from: AgentId,
        /// The unknown recipient address.
        to: AgentId,
        /// Payload tag.
        kind: &'static str,
    },
    /// A message was dropped because the cascade hit the hop limit.
    CascadeTruncated {
        /// Recipient address of the dropped message.
        to: AgentId,
        /// Payload tag.
        kind: &'static str,
        /// Hop the message would have been delivered at.
        hop: u32,
    },
    /// An agent ran its startup routine.
    AgentStarted {
        /// The agent.
        agent: AgentId,
    },
    /// The coordination agent produced an allocation plan.
    PlanGenerated {
        /// The coordination agent.
        agent: AgentId,
        /// Number of areas in the plan.
        areas: usize,
        /// Number of non-zero `(area, resource)` allocations.
        allocations: usize,
    },
    /// The distribution agent queued tasks from a plan.
    TasksGenerated {
        /// The distribution agent.
        agent: AgentId,
        /// Number of tasks created.
        count: usize,
    },
    /// The assessment agent produced a prediction.
    PredictionGenerated {
        /// The assessment agent.
        agent: AgentId,
        /// The prediction.
        prediction: PredictionId,
        /// Its risk level.
        risk_level: u8,
    },
    /// The assessment agent raised an alert.
    AlertRaised {
        /// The assessment agent.
        agent: AgentId,
        /// Risk level that crossed the threshold.
        risk_level: u8,
    },
    /// The broadcast agent fanned an alert out.
    AlertBroadcast {
        /// The broadcast agent.
        agent: AgentId,
        /// Number of recipients addressed.
        recipients: usize,
    },
}

/// Destination for lifecycle events.
pub trait EventSink: Send + Sync {
    /// Record one event. Must not panic.
    fn record(&self, event: &BusEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn record(&self, _event: &BusEvent) {}
}

/// Sink that forwards events to `tracing`.
///
/// Message traffic is logged at `debug`, routing problems at `warn`, and
/// domain milestones (plans, tasks, predictions, alerts) at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &BusEvent) {
        match event {
            BusEvent::MessageSent { from, to, kind } => {
                debug!(from = %from, to = %to, kind, "Message sent");
            }
            BusEvent::MessageDelivered { to, kind, hop } => {
                debug!(to = %to, kind, hop, "Message delivered");
            }
            BusEvent::Unroutable { from, to, kind } => {
                warn!(from = %from, to = %to, kind, "No subscriber for recipient");
            }
            BusEvent::CascadeTruncated { to, kind, hop } => {
                warn!(to = %to, kind, hop, "Cascade hop limit reached, message dropped");
            }
            BusEvent::AgentStarted { agent } => {
                info!(agent = %agent, "Agent started");
            }
            BusEvent::PlanGenerated {
                agent,
                areas,
                allocations,
            } => {
                info!(agent = %agent, areas, allocations, "Created allocation plan");
            }
            BusEvent::TasksGenerated { agent, count } => {
                info!(agent = %agent, count, "Generated distribution tasks");
            }
            BusEvent::PredictionGenerated {
                agent,
                prediction,
                risk_level,
            } => {
                info!(agent = %agent, prediction = %prediction, risk_level, "Generated prediction");
            }
            BusEvent::AlertRaised { agent, risk_level } => {
                info!(agent = %agent, risk_level, "Alert raised");
            }
            BusEvent::AlertBroadcast { agent, recipients } => {
                info!(agent = %agent, recipients, "Broadcasted alert");
            }
        }
    }
}

/// Sink that keeps every event in memory, in recording order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<BusEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Copy of all recorded events.
    pub fn events(&self) -> Vec<BusEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&BusEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &BusEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        let agent = AgentId::from("relief_coordinator");
        sink.record(&BusEvent::AgentStarted {
            agent: agent.clone(),
        });
        sink.record(&BusEvent::TasksGenerated { agent, count: 3 });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events.first(), Some(BusEvent::AgentStarted { .. })));
        assert_eq!(
            sink.count(|e| matches!(e, BusEvent::TasksGenerated { count: 3, .. })),
            1
        );
    }
}
