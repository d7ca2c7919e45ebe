//! In-process message bus.
//!
//! The [`Bus`] maps agent ids to [`Handler`]s and delivers addressed
//! messages. Delivery is synchronous in effect: [`Bus::publish`] returns
//! only after the recipient, and every agent reached by the reaction
//! cascade it triggers, has finished reacting.
//!
//! # Cascades
//!
//! Handlers do not call each other. A message published while a cascade
//! is already running on the same thread is appended to a FIFO work queue
//! which the outermost call drains breadth-first. Consequences:
//!
//! - Stack depth is constant regardless of cascade length.
//! - Every recipient sees its messages in the order they were queued.
//! - Each message carries a hop count (0 for the stimulus, parent + 1 for
//!   anything published while handling it). Messages beyond `max_hops`
//!   are dropped and reported, which stops cycles between agents.
//!
//! One cascade runs at a time. A publish from another thread waits until
//! the running cascade has drained, then opens its own, so its report
//! and hop counts never mix with someone else's stimulus.
//!
//! # Locking
//!
//! A handler's mutex is held only while it handles one message, and the
//! bus holds no lock of its own during that call. A handler may therefore
//! publish, register, or address itself without deadlocking. Code outside
//! the bus that locks an agent and makes it publish must do so inside
//! [`Bus::cascade`] (or use [`Bus::start_agent`]) so the lock is released
//! before the cascade drains.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use relief_types::{AgentId, Message};
use tracing::{debug, warn};

use crate::sink::{BusEvent, EventSink};

/// Default maximum hop count for a single cascade.
pub const DEFAULT_MAX_HOPS: u32 = 64;

/// Something that can receive bus messages.
pub trait Handler: Send {
    /// Handle one delivered message.
    fn deliver(&mut self, message: &Message);

    /// Run the handler's one-shot startup routine, if it has one.
    fn boot(&mut self) {}
}

/// A handler shared between the bus and the code that built it.
pub type SharedHandler = Arc<Mutex<dyn Handler>>;

/// Adapts a closure into a [`Handler`].
pub struct FnHandler<F>(pub F);

impl<F> Handler for FnHandler<F>
where
    F: FnMut(&Message) + Send,
{
    fn deliver(&mut self, message: &Message) {
        (self.0)(message);
    }
}

/// Outcome of one cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Messages handed to a registered handler.
    pub delivered: u32,
    /// Recipients that had no handler, in the order they were hit.
    pub unroutable: Vec<AgentId>,
    /// Messages dropped by the hop limit.
    pub truncated: u32,
    /// `true` when the call joined a cascade already running on this thread.
    /// Totals are then reported only by the outermost call.
    pub joined: bool,
}

impl DeliveryReport {
    const fn joined() -> Self {
        Self {
            delivered: 0,
            unroutable: Vec::new(),
            truncated: 0,
            joined: true,
        }
    }
}

/// A queued message and its distance from the originating stimulus.
struct Envelope {
    message: Message,
    hop: u32,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Envelope>,
    /// Thread whose outermost call owns the open cascade, if any.
    owner: Option<ThreadId>,
    /// Hop of the message currently being handled, if any.
    current_hop: Option<u32>,
    report: DeliveryReport,
}

/// Address-based router between agents.
pub struct Bus {
    registry: RwLock<BTreeMap<AgentId, SharedHandler>>,
    queue: Mutex<QueueState>,
    idle: Condvar,
    sink: Arc<dyn EventSink>,
    max_hops: u32,
}

impl core::fmt::Debug for Bus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bus")
            .field("registered", &self.registered())
            .field("max_hops", &self.max_hops)
            .finish_non_exhaustive()
    }
}

impl Bus {
    /// Create a bus reporting lifecycle events to `sink`.
    pub fn new(max_hops: u32, sink: Arc<dyn EventSink>) -> Self {
        Self {
            registry: RwLock::new(BTreeMap::new()),
            queue: Mutex::new(QueueState::default()),
            idle: Condvar::new(),
            sink,
            max_hops,
        }
    }

    /// Bind `id` to `handler`.
    ///
    /// Registering an id that is already bound replaces the previous
    /// handler (last writer wins) and returns it. The bus does not guard
    /// against this; it only logs a warning.
    pub fn register(&self, id: AgentId, handler: SharedHandler) -> Option<SharedHandler> {
        let previous = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), handler);
        if previous.is_some() {
            warn!(agent = %id, "Handler replaced by a later registration");
        } else {
            debug!(agent = %id, "Agent subscribed");
        }
        previous
    }

    /// Whether a handler is bound to `id`.
    pub fn is_registered(&self, id: &AgentId) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// All registered ids in ascending order.
    pub fn registered(&self) -> Vec<AgentId> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Maximum hop count of a cascade.
    pub const fn max_hops(&self) -> u32 {
        self.max_hops
    }

    /// Forward a lifecycle event to the configured sink.
    pub fn emit(&self, event: &BusEvent) {
        self.sink.record(event);
    }

    /// Deliver `message` and everything it triggers.
    ///
    /// An unknown recipient is reported (log, sink, and
    /// [`DeliveryReport::unroutable`]) and never aborts the cascade.
    pub fn publish(&self, message: Message) -> DeliveryReport {
        let ((), report) = self.cascade(|| self.enqueue(message));
        report
    }

    /// Run `f` with publishing deferred, then drain everything it queued.
    ///
    /// Inside a cascade already running on this thread this simply runs
    /// `f`; the queued messages are drained by the outermost call. A
    /// cascade owned by another thread is waited out first.
    pub fn cascade<R>(&self, f: impl FnOnce() -> R) -> (R, DeliveryReport) {
        let me = thread::current().id();
        let outermost = {
            let mut queue = self.lock_queue();
            if queue.owner == Some(me) {
                false
            } else {
                while queue.owner.is_some() {
                    queue = self
                        .idle
                        .wait(queue)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                queue.owner = Some(me);
                queue.current_hop = None;
                queue.report = DeliveryReport::default();
                true
            }
        };

        if !outermost {
            return (f(), DeliveryReport::joined());
        }

        let mut guard = CascadeGuard {
            bus: self,
            armed: true,
        };
        let out = f();
        let report = self.drain();
        guard.armed = false;
        (out, report)
    }

    /// Run the startup routine of the handler bound to `id` and drain the
    /// cascade it starts. Returns `None` if `id` is not registered.
    pub fn start_agent(&self, id: &AgentId) -> Option<DeliveryReport> {
        let handler = self.lookup(id)?;
        let ((), report) = self.cascade(|| {
            handler
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .boot();
        });
        Some(report)
    }

    fn lookup(&self, id: &AgentId) -> Option<SharedHandler> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn lock_queue(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, message: Message) {
        let mut queue = self.lock_queue();
        let hop = queue.current_hop.map_or(0, |h| h.saturating_add(1));
        if hop > self.max_hops {
            queue.report.truncated = queue.report.truncated.saturating_add(1);
            drop(queue);
            self.sink.record(&BusEvent::CascadeTruncated {
                to: message.recipient().clone(),
                kind: message.content().kind(),
                hop,
            });
            return;
        }
        queue.pending.push_back(Envelope { message, hop });
    }

    fn drain(&self) -> DeliveryReport {
        loop {
            let envelope = {
                let mut queue = self.lock_queue();
                match queue.pending.pop_front() {
                    Some(envelope) => {
                        queue.current_hop = Some(envelope.hop);
                        envelope
                    }
                    None => {
                        queue.owner = None;
                        queue.current_hop = None;
                        let report = std::mem::take(&mut queue.report);
                        drop(queue);
                        self.idle.notify_all();
                        return report;
                    }
                }
            };
            self.deliver(&envelope);
        }
    }

    fn deliver(&self, envelope: &Envelope) {
        let message = &envelope.message;
        let Some(handler) = self.lookup(message.recipient()) else {
            self.sink.record(&BusEvent::Unroutable {
                from: message.sender().clone(),
                to: message.recipient().clone(),
                kind: message.content().kind(),
            });
            self.lock_queue()
                .report
                .unroutable
                .push(message.recipient().clone());
            return;
        };

        self.sink.record(&BusEvent::MessageDelivered {
            to: message.recipient().clone(),
            kind: message.content().kind(),
            hop: envelope.hop,
        });
        handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .deliver(message);

        let mut queue = self.lock_queue();
        queue.report.delivered = queue.report.delivered.saturating_add(1);
    }
}

/// Closes the cascade if a handler panics mid-drain, so the bus stays
/// usable for later publishes.
struct CascadeGuard<'a> {
    bus: &'a Bus,
    armed: bool,
}

impl Drop for CascadeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut queue = self.bus.lock_queue();
            queue.pending.clear();
            queue.owner = None;
            queue.current_hop = None;
            drop(queue);
            self.bus.idle.notify_all();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use relief_types::Payload;

    use super::*;
    use crate::sink::MemorySink;

    fn msg(from: &str, to: &str) -> Message {
        Message::new(AgentId::from(from), AgentId::from(to), Payload::Unrecognized)
    }

    fn recorder() -> (Arc<Mutex<Vec<Message>>>, SharedHandler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: SharedHandler = Arc::new(Mutex::new(FnHandler(move |m: &Message| {
            sink.lock().unwrap().push(m.clone());
        })));
        (seen, handler)
    }

    #[test]
    fn delivers_to_registered_handler() {
        let bus = Bus::new(DEFAULT_MAX_HOPS, Arc::new(MemorySink::new()));
        let (seen, handler) = recorder();
        bus.register(AgentId::from("analytics"), handler);

        let report = bus.publish(msg("driver", "analytics"));
        assert_eq!(report.delivered, 1);
        assert!(report.unroutable.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn unroutable_is_reported_and_non_fatal() {
        let sink = Arc::new(MemorySink::new());
        let bus = Bus::new(DEFAULT_MAX_HOPS, sink.clone());
        let (seen, handler) = recorder();
        bus.register(AgentId::from("analytics"), handler);

        let report = bus.publish(msg("driver", "nobody"));
        assert_eq!(report.delivered, 0);
        assert_eq!(report.unroutable, vec![AgentId::from("nobody")]);
        assert_eq!(sink.count(|e| matches!(e, BusEvent::Unroutable { .. })), 1);

        // The bus keeps working afterwards.
        let report = bus.publish(msg("driver", "analytics"));
        assert_eq!(report.delivered, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn second_registration_wins() {
        let bus = Bus::new(DEFAULT_MAX_HOPS, Arc::new(MemorySink::new()));
        let (first, first_handler) = recorder();
        let (second, second_handler) = recorder();
        assert!(bus.register(AgentId::from("a"), first_handler).is_none());
        assert!(bus.register(AgentId::from("a"), second_handler).is_some());

        bus.publish(msg("driver", "a"));
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    /// Forwards every message it receives to `next`.
    struct Relay {
        bus: Arc<Bus>,
        me: AgentId,
        next: AgentId,
        received: u32,
    }

    impl Handler for Relay {
        fn deliver(&mut self, _message: &Message) {
            self.received += 1;
            let report = self.bus.publish(Message::new(
                self.me.clone(),
                self.next.clone(),
                Payload::Unrecognized,
            ));
            assert!(report.joined);
        }
    }

    #[test]
    fn cycles_are_cut_by_the_hop_limit() {
        let sink = Arc::new(MemorySink::new());
        let bus = Arc::new(Bus::new(5, sink.clone()));
        let ping = Arc::new(Mutex::new(Relay {
            bus: Arc::clone(&bus),
            me: AgentId::from("ping"),
            next: AgentId::from("pong"),
            received: 0,
        }));
        let pong = Arc::new(Mutex::new(Relay {
            bus: Arc::clone(&bus),
            me: AgentId::from("pong"),
            next: AgentId::from("ping"),
            received: 0,
        }));
        bus.register(AgentId::from("ping"), ping.clone());
        bus.register(AgentId::from("pong"), pong.clone());

        let report = bus.publish(msg("driver", "ping"));

        // Hops 0..=5 are delivered, the hop-6 message is dropped.
        assert_eq!(report.delivered, 6);
        assert_eq!(report.truncated, 1);
        assert_eq!(ping.lock().unwrap().received, 3);
        assert_eq!(pong.lock().unwrap().received, 3);
        assert_eq!(
            sink.count(|e| matches!(e, BusEvent::CascadeTruncated { hop: 6, .. })),
            1
        );
    }

    #[test]
    fn cascade_is_breadth_first() {
        let bus = Arc::new(Bus::new(DEFAULT_MAX_HOPS, Arc::new(MemorySink::new())));
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["b", "c", "d"] {
            let order = Arc::clone(&order);
            let handler: SharedHandler = Arc::new(Mutex::new(FnHandler(move |_m: &Message| {
                order.lock().unwrap().push(name);
            })));
            bus.register(AgentId::from(name), handler);
        }

        // "a" fans out to b and c; b then sends to d.
        let fan_bus = Arc::clone(&bus);
        let fan_order = Arc::clone(&order);
        let a: SharedHandler = Arc::new(Mutex::new(FnHandler(move |_m: &Message| {
            fan_order.lock().unwrap().push("a");
            fan_bus.publish(msg("a", "b"));
            fan_bus.publish(msg("a", "c"));
        })));
        bus.register(AgentId::from("a"), a);
        let b_bus = Arc::clone(&bus);
        let b_order = Arc::clone(&order);
        let b: SharedHandler = Arc::new(Mutex::new(FnHandler(move |_m: &Message| {
            b_order.lock().unwrap().push("b");
            b_bus.publish(msg("b", "d"));
        })));
        bus.register(AgentId::from("b"), b);

        let report = bus.publish(msg("driver", "a"));
        assert_eq!(report.delivered, 4);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn cascade_defers_until_closure_returns() {
        let bus = Bus::new(DEFAULT_MAX_HOPS, Arc::new(MemorySink::new()));
        let (seen, handler) = recorder();
        bus.register(AgentId::from("x"), handler);

        let (count_inside, report) = bus.cascade(|| {
            bus.publish(msg("driver", "x"));
            bus.publish(msg("driver", "x"));
            seen.lock().unwrap().len()
        });
        assert_eq!(count_inside, 0);
        assert_eq!(report.delivered, 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn publish_from_another_thread_waits_for_its_own_delivery() {
        let bus = Arc::new(Bus::new(DEFAULT_MAX_HOPS, Arc::new(MemorySink::new())));
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let slow: SharedHandler = Arc::new(Mutex::new(FnHandler(move |_m: &Message| {
            entered_tx.send(()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(200));
        })));
        bus.register(AgentId::from("slow"), slow);
        let (seen, fast) = recorder();
        bus.register(AgentId::from("fast"), fast);

        let slow_bus = Arc::clone(&bus);
        let first = std::thread::spawn(move || slow_bus.publish(msg("driver", "slow")));
        entered_rx.recv().unwrap();

        let report = bus.publish(msg("driver", "fast"));
        let seen_on_return = seen.lock().unwrap().len();

        assert!(!report.joined);
        assert_eq!(report.delivered, 1);
        assert_eq!(seen_on_return, 1);

        let first_report = first.join().unwrap();
        assert!(!first_report.joined);
        assert_eq!(first_report.delivered, 1);
    }

    #[test]
    fn start_agent_on_unknown_id_is_none() {
        let bus = Bus::new(DEFAULT_MAX_HOPS, Arc::new(MemorySink::new()));
        assert!(bus.start_agent(&AgentId::from("ghost")).is_none());
    }
}
