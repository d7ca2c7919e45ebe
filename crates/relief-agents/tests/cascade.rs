//! End-to-end cascades across all four agents on one bus.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use relief_agents::{
    AssessmentAgent, BroadcastAgent, CoordinationAgent, DistributionAgent, FixedAreaSource,
    WIND_SPEED,
};
use relief_core::{
    Agent, AgentDirectory, AssessmentConfig, Bus, BusEvent, DEFAULT_MAX_HOPS, DistributionConfig,
    MemorySink, SharedContext,
};
use relief_types::{
    AgentId, AreaDemand, Coordinates, DataSource, Message, Payload, Reading, Receiver,
    ResourceKind, Situation, Skill, Task, Volunteer, VolunteerId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct System {
    bus: Arc<Bus>,
    sink: Arc<MemorySink>,
    context: Arc<SharedContext>,
    directory: AgentDirectory,
    coordinator: Arc<Mutex<CoordinationAgent>>,
    distribution: Arc<Mutex<DistributionAgent>>,
    assessment: Arc<Mutex<AssessmentAgent>>,
}

fn area(name: &str, severity: u8, population: u32) -> AreaDemand {
    AreaDemand {
        name: name.to_owned(),
        severity,
        population,
        needs: BTreeSet::from([ResourceKind::Food, ResourceKind::Water]),
    }
}

fn volunteer(id: &str, skills: &[Skill]) -> Volunteer {
    Volunteer {
        id: VolunteerId::from(id),
        name: id.to_owned(),
        skills: skills.iter().copied().collect(),
        location: "Base Camp".to_owned(),
        available: true,
    }
}

fn build() -> System {
    let sink = Arc::new(MemorySink::new());
    let bus = Arc::new(Bus::new(DEFAULT_MAX_HOPS, sink.clone()));
    let context = SharedContext::new(Situation {
        disaster_type: "earthquake".to_owned(),
        location: "Los Angeles".to_owned(),
        severity: 8,
    });
    let directory = AgentDirectory::default();

    let coordinator = Arc::new(Mutex::new(CoordinationAgent::new(
        &directory,
        Arc::clone(&bus),
        context.claim_resources().unwrap(),
        BTreeMap::from([(ResourceKind::Food, 1000), (ResourceKind::Water, 5000)]),
    )));
    let distribution = Arc::new(Mutex::new(DistributionAgent::new(
        &directory,
        Arc::clone(&bus),
        context.claim_volunteers().unwrap(),
        DistributionConfig::default(),
        vec![
            volunteer("v1", &[Skill::Medical, Skill::Logistics]),
            volunteer("v2", &[Skill::Logistics]),
            volunteer("v3", &[Skill::Rescue]),
        ],
    )));
    let broadcast = Arc::new(Mutex::new(BroadcastAgent::new(
        &directory,
        Arc::clone(&bus),
        context.claim_receivers().unwrap(),
        vec![Receiver {
            id: AgentId::from("rescue_team_1"),
            location: Coordinates {
                lat: 34.0522,
                lon: -118.2437,
            },
        }],
    )));
    let assessment = Arc::new(Mutex::new(AssessmentAgent::new(
        &directory,
        Arc::clone(&bus),
        Arc::clone(&context),
        AssessmentConfig::default(),
        Box::new(FixedAreaSource::new(vec![
            area("B", 2, 1000),
            area("A", 8, 5000),
        ])),
    )));

    bus.register(directory.coordinator.clone(), coordinator.clone());
    bus.register(directory.distribution.clone(), distribution.clone());
    bus.register(directory.broadcast.clone(), broadcast);
    bus.register(directory.assessment.clone(), assessment.clone());

    for id in [
        &directory.coordinator,
        &directory.distribution,
        &directory.broadcast,
        &directory.assessment,
    ] {
        bus.start_agent(id).unwrap();
    }

    System {
        bus,
        sink,
        context,
        directory,
        coordinator,
        distribution,
        assessment,
    }
}

fn weather(system: &System, wind: Decimal) {
    system.bus.publish(Message::new(
        system.directory.broadcast.clone(),
        system.directory.assessment.clone(),
        Payload::NewData {
            source: DataSource::Weather,
            data: Reading::new()
                .with(WIND_SPEED, wind)
                .with("rainfall", dec!(5)),
        },
    ));
}

fn alerts(system: &System) -> usize {
    system
        .sink
        .count(|e| matches!(e, BusEvent::AlertRaised { .. }))
}

#[test]
fn startup_cascade_allocates_and_queues_tasks() {
    let system = build();

    let plan = system
        .coordinator
        .lock()
        .unwrap()
        .current_plan()
        .cloned()
        .unwrap();
    assert_eq!(plan.quantity("A", ResourceKind::Food), 952);
    assert_eq!(plan.quantity("B", ResourceKind::Food), 2);
    assert_eq!(plan.quantity("A", ResourceKind::Water), 4761);
    assert_eq!(plan.quantity("B", ResourceKind::Water), 11);

    let distribution = system.distribution.lock().unwrap();
    assert_eq!(distribution.pending_tasks().len(), 4);
    assert_eq!(
        distribution.available_with_skill(Skill::Medical),
        BTreeSet::from([VolunteerId::from("v1")])
    );
    assert!(
        distribution
            .available_with_skill(Skill::Engineering)
            .is_empty()
    );

    let task = distribution.pending_tasks().first().unwrap();
    assert_eq!(task.location, "A");
    assert_eq!(
        distribution.candidates_for(task),
        BTreeSet::from([VolunteerId::from("v1"), VolunteerId::from("v2")])
    );
}

#[test]
fn plan_conserves_inventory() {
    let system = build();
    let plan = system
        .coordinator
        .lock()
        .unwrap()
        .current_plan()
        .cloned()
        .unwrap();
    for (kind, quantity) in system.context.resources() {
        assert!(plan.total(kind) <= u64::from(quantity));
    }
}

#[test]
fn startup_is_deterministic() {
    let tasks = |system: &System| -> Vec<Task> {
        system.distribution.lock().unwrap().pending_tasks().to_vec()
    };
    let first = build();
    let second = build();
    assert_eq!(tasks(&first), tasks(&second));
    assert_eq!(
        first.coordinator.lock().unwrap().current_plan(),
        second.coordinator.lock().unwrap().current_plan()
    );
}

#[test]
fn status_reports_reach_their_peers() {
    let system = build();
    assert_eq!(system.assessment.lock().unwrap().teams_connected(), Some(1));
    assert_eq!(system.context.volunteers().len(), 3);
    assert_eq!(system.context.receivers().len(), 1);
}

#[test]
fn calm_weather_raises_no_alert() {
    let system = build();
    weather(&system, dec!(10));
    assert_eq!(alerts(&system), 0);
    assert!(system.assessment.lock().unwrap().predictions().is_empty());
}

#[test]
fn strong_wind_over_a_high_window_raises_exactly_one_alert() {
    let system = build();
    for _ in 0..4 {
        weather(&system, dec!(90));
    }
    let before = alerts(&system);
    let broadcasts_before = system
        .sink
        .count(|e| matches!(e, BusEvent::AlertBroadcast { .. }));

    weather(&system, dec!(60));

    assert_eq!(alerts(&system) - before, 1);
    assert_eq!(
        system
            .sink
            .count(|e| matches!(e, BusEvent::AlertBroadcast { .. }))
            - broadcasts_before,
        1
    );
}

#[test]
fn unregistered_receiver_does_not_stop_the_cascade() {
    let system = build();
    for _ in 0..5 {
        weather(&system, dec!(80));
    }
    // rescue_team_1 has no handler; the coordinator still gets the alert.
    let unroutable = system.sink.count(|e| {
        matches!(e, BusEvent::Unroutable { to, kind: "emergency_alert", .. } if to.as_str() == "rescue_team_1")
    });
    assert_eq!(unroutable, 5);
    let coordinator_alerts = system
        .coordinator
        .lock()
        .unwrap()
        .core()
        .history()
        .iter()
        .filter(|m| matches!(m.content(), Payload::EmergencyAlert(_)))
        .count();
    assert_eq!(coordinator_alerts, 5);
}
