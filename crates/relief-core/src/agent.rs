//! The agent capability contract.
//!
//! Every agent embeds an [`AgentCore`] (id, bus handle, message history)
//! and implements [`Agent::on_message`] and [`Agent::on_start`]. The
//! provided methods give every variant the same behavior:
//!
//! - [`Agent::receive`] records the message, then reacts to it.
//! - [`Agent::send`] stamps, records, and publishes a message.
//! - [`Agent::start`] runs the startup routine at most once.
//!
//! Any [`Agent`] is also a bus [`Handler`], so an `Arc<Mutex<A>>` can be
//! registered directly.

use std::collections::VecDeque;
use std::sync::Arc;

use relief_types::{AgentId, Message, Payload};
use tracing::warn;

use crate::bus::{Bus, DeliveryReport, Handler};
use crate::sink::BusEvent;

/// Number of messages an agent keeps in its history.
pub const MAX_HISTORY: usize = 1_000;

/// State shared by every agent variant.
#[derive(Debug)]
pub struct AgentCore {
    id: AgentId,
    name: String,
    bus: Arc<Bus>,
    /// Sent and received messages, oldest first.
    history: VecDeque<Message>,
    started: bool,
}

impl AgentCore {
    /// Create the core for an agent addressed as `id`.
    pub fn new(id: AgentId, name: impl Into<String>, bus: Arc<Bus>) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            history: VecDeque::new(),
            started: false,
        }
    }

    /// Bus address.
    pub const fn id(&self) -> &AgentId {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bus this agent publishes on.
    pub const fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    /// Sent and received messages, oldest first, capped at
    /// [`MAX_HISTORY`].
    pub const fn history(&self) -> &VecDeque<Message> {
        &self.history
    }

    /// Whether the startup routine has run.
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Append a message to the history, evicting the oldest if full.
    pub fn record(&mut self, message: Message) {
        self.history.push_back(message);
        if self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    /// Build a message from this agent, record it, and publish it.
    pub fn send(&mut self, to: AgentId, content: Payload) -> DeliveryReport {
        let message = Message::new(self.id.clone(), to, content);
        self.bus.emit(&BusEvent::MessageSent {
            from: self.id.clone(),
            to: message.recipient().clone(),
            kind: message.content().kind(),
        });
        self.record(message.clone());
        self.bus.publish(message)
    }

    /// Report a lifecycle event through the bus sink.
    pub fn emit(&self, event: &BusEvent) {
        self.bus.emit(event);
    }

    const fn mark_started(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        true
    }
}

/// A participant that communicates only through the bus.
pub trait Agent: Send {
    /// Shared agent state.
    fn core(&self) -> &AgentCore;

    /// Mutable shared agent state.
    fn core_mut(&mut self) -> &mut AgentCore;

    /// React to a delivered message.
    ///
    /// Implementations match [`Payload`] exhaustively and ignore kinds they
    /// do not handle. They must not panic.
    fn on_message(&mut self, message: &Message);

    /// Self-initialization run by [`Agent::start`].
    fn on_start(&mut self);

    /// Bus address.
    fn id(&self) -> &AgentId {
        self.core().id()
    }

    /// Record `message`, then react to it.
    fn receive(&mut self, message: &Message) {
        self.core_mut().record(message.clone());
        self.on_message(message);
    }

    /// Send `content` to `to` through the bus.
    fn send(&mut self, to: AgentId, content: Payload) -> DeliveryReport {
        self.core_mut().send(to, content)
    }

    /// Run the startup routine. Returns `false` (and does nothing) if it
    /// already ran.
    fn start(&mut self) -> bool {
        if !self.core_mut().mark_started() {
            warn!(agent = %self.id(), "Agent already started, ignoring");
            return false;
        }
        let core = self.core();
        core.emit(&BusEvent::AgentStarted {
            agent: core.id().clone(),
        });
        self.on_start();
        true
    }
}

impl<A: Agent> Handler for A {
    fn deliver(&mut self, message: &Message) {
        self.receive(message);
    }

    fn boot(&mut self) {
        self.start();
    }
}
