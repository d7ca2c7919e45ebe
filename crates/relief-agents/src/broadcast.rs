//! Broadcast agent: receiver roster and alert fan-out.
//!
//! The broadcast agent owns the receiver field of the shared context.
//! Receivers are addressed on the bus by their roster id; a receiver with
//! no registered handler simply shows up as unroutable.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use relief_core::{Agent, AgentCore, AgentDirectory, Bus, BusEvent, ReceiverWriter};
use relief_types::{
    AgentId, AlertNotice, Coordinates, MAX_RISK_LEVEL, Message, Payload, Receiver, SystemStatus,
};
use tracing::{debug, info};

/// Clean up an alert before it is fanned out.
///
/// Trims the message, drops blank and repeated entries from the area and
/// action lists (first occurrence wins), and caps the risk level.
pub fn normalize_alert(notice: &AlertNotice) -> AlertNotice {
    AlertNotice {
        alert_type: notice.alert_type,
        message: notice.message.trim().to_owned(),
        risk_level: notice.risk_level.min(MAX_RISK_LEVEL),
        areas_affected: dedupe(&notice.areas_affected),
        recommended_actions: dedupe(&notice.recommended_actions),
    }
}

fn dedupe(items: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && seen.insert(*s))
        .map(str::to_owned)
        .collect()
}

/// Keeps the receiver roster and relays alerts to it.
#[derive(Debug)]
pub struct BroadcastAgent {
    core: AgentCore,
    receivers: ReceiverWriter,
    coordinator: AgentId,
    assessment: AgentId,
    /// Registered on start, then emptied.
    seed_receivers: Vec<Receiver>,
    roster: BTreeMap<AgentId, Receiver>,
}

impl BroadcastAgent {
    /// Create the agent. `seed_receivers` join the roster when the agent
    /// starts.
    pub fn new(
        directory: &AgentDirectory,
        bus: Arc<Bus>,
        receivers: ReceiverWriter,
        seed_receivers: Vec<Receiver>,
    ) -> Self {
        Self {
            core: AgentCore::new(directory.broadcast.clone(), "Communication Agent", bus),
            receivers,
            coordinator: directory.coordinator.clone(),
            assessment: directory.assessment.clone(),
            seed_receivers,
            roster: BTreeMap::new(),
        }
    }

    /// Insert a receiver or move an existing one.
    pub fn update_receiver_location(&mut self, id: AgentId, location: Coordinates) {
        let receiver = Receiver {
            id: id.clone(),
            location,
        };
        self.receivers.upsert(receiver.clone());
        self.roster.insert(id.clone(), receiver);
        debug!(agent = %self.id(), receiver = %id, "Updated receiver location");
    }

    /// The receivers, keyed and ordered by id.
    pub const fn roster(&self) -> &BTreeMap<AgentId, Receiver> {
        &self.roster
    }

    /// Send the normalized alert to every receiver in ascending id order,
    /// then to the coordination agent.
    fn broadcast_alert(&mut self, notice: &AlertNotice) {
        let alert = normalize_alert(notice);
        let recipients: Vec<AgentId> = self
            .roster
            .keys()
            .cloned()
            .chain(std::iter::once(self.coordinator.clone()))
            .collect();

        for to in &recipients {
            self.send(to.clone(), Payload::EmergencyAlert(alert.clone()));
        }

        self.core.emit(&BusEvent::AlertBroadcast {
            agent: self.id().clone(),
            recipients: recipients.len(),
        });
        info!(agent = %self.id(), alert_type = %alert.alert_type, "Broadcasted alert");
    }
}

impl Agent for BroadcastAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn on_message(&mut self, message: &Message) {
        match message.content() {
            Payload::Alert(notice) => self.broadcast_alert(notice),
            Payload::VolunteerStatus { total_volunteers } => {
                debug!(agent = %self.id(), total_volunteers, "Volunteer status received");
            }
            Payload::NeedAssessment { .. }
            | Payload::NewAllocationPlan { .. }
            | Payload::EmergencyAlert(_)
            | Payload::NewData { .. }
            | Payload::RequestAreaAssessment { .. }
            | Payload::CommunicationSystemStatus { .. }
            | Payload::Unrecognized => {}
        }
    }

    fn on_start(&mut self) {
        for receiver in std::mem::take(&mut self.seed_receivers) {
            self.update_receiver_location(receiver.id, receiver.location);
        }
        info!(agent = %self.id(), count = self.roster.len(), "Initialized receivers");

        let teams_connected = u32::try_from(self.roster.len()).unwrap_or(u32::MAX);
        let to = self.assessment.clone();
        self.send(
            to,
            Payload::CommunicationSystemStatus {
                status: SystemStatus::Operational,
                teams_connected,
            },
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Mutex, PoisonError};

    use relief_core::{DEFAULT_MAX_HOPS, FnHandler, MemorySink, SharedContext};
    use relief_types::{PredictionKind, Situation};

    use super::*;

    fn notice() -> AlertNotice {
        AlertNotice {
            alert_type: PredictionKind::WeatherImpact,
            message: "  High risk detected: 8/10 ".to_owned(),
            risk_level: 8,
            areas_affected: vec!["Area A".to_owned(), "Area A".to_owned(), " ".to_owned()],
            recommended_actions: vec!["Evacuate high-risk areas".to_owned()],
        }
    }

    #[test]
    fn normalize_trims_and_dedupes() {
        let alert = normalize_alert(&notice());
        assert_eq!(alert.message, "High risk detected: 8/10");
        assert_eq!(alert.areas_affected, vec!["Area A".to_owned()]);
        assert_eq!(alert.recommended_actions.len(), 1);
    }

    #[test]
    fn alert_reaches_receivers_in_order_then_coordinator() {
        let sink = Arc::new(MemorySink::new());
        let bus = Arc::new(Bus::new(DEFAULT_MAX_HOPS, sink.clone()));
        let ctx = SharedContext::new(Situation {
            disaster_type: "earthquake".to_owned(),
            location: "Los Angeles".to_owned(),
            severity: 8,
        });
        let directory = AgentDirectory::default();

        let order = Arc::new(Mutex::new(Vec::new()));
        for id in ["rescue_team_2", "rescue_team_1"] {
            let log = Arc::clone(&order);
            bus.register(
                AgentId::from(id),
                Arc::new(Mutex::new(FnHandler(move |m: &Message| {
                    log.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(m.recipient().clone());
                }))),
            );
        }

        let here = Coordinates {
            lat: 34.0522,
            lon: -118.2437,
        };
        let agent = Arc::new(Mutex::new(BroadcastAgent::new(
            &directory,
            Arc::clone(&bus),
            ctx.claim_receivers().unwrap(),
            vec![
                Receiver {
                    id: AgentId::from("rescue_team_2"),
                    location: here,
                },
                Receiver {
                    id: AgentId::from("rescue_team_1"),
                    location: here,
                },
                Receiver {
                    id: AgentId::from("rescue_team_3"),
                    location: here,
                },
            ],
        )));
        bus.register(directory.broadcast.clone(), agent.clone());
        bus.start_agent(&directory.broadcast).unwrap();
        assert_eq!(ctx.receivers().len(), 3);

        let report = bus.publish(Message::new(
            directory.assessment.clone(),
            directory.broadcast.clone(),
            Payload::Alert(notice()),
        ));

        // team 3 and the coordinator have no handler in this test.
        assert_eq!(
            report.unroutable,
            vec![AgentId::from("rescue_team_3"), directory.coordinator.clone()]
        );
        assert_eq!(
            *order.lock().unwrap(),
            vec![AgentId::from("rescue_team_1"), AgentId::from("rescue_team_2")]
        );
        assert_eq!(
            sink.count(|e| matches!(e, BusEvent::AlertBroadcast { recipients: 4, .. })),
            1
        );
    }

    #[test]
    fn location_update_is_an_upsert() {
        let bus = Arc::new(Bus::new(DEFAULT_MAX_HOPS, Arc::new(MemorySink::new())));
        let ctx = SharedContext::new(Situation {
            disaster_type: "flood".to_owned(),
            location: "Sacramento".to_owned(),
            severity: 5,
        });
        let mut agent = BroadcastAgent::new(
            &AgentDirectory::default(),
            bus,
            ctx.claim_receivers().unwrap(),
            Vec::new(),
        );
        let id = AgentId::from("rescue_team_1");
        agent.update_receiver_location(id.clone(), Coordinates { lat: 1.0, lon: 2.0 });
        agent.update_receiver_location(id.clone(), Coordinates { lat: 3.0, lon: 4.0 });

        assert_eq!(agent.roster().len(), 1);
        let moved = ctx.receivers().get(&id).map(|r| r.location).unwrap();
        assert!((moved.lat - 3.0).abs() < f64::EPSILON);
    }
}
