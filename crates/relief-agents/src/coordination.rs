//! Coordination agent and the weighted allocation pass.
//!
//! The coordination agent owns the inventory field of the shared context.
//! On start it seeds the inventory and asks the assessment agent for an
//! area assessment. Each need assessment it receives is turned into an
//! [`AllocationPlan`] and sent to the distribution agent.
//!
//! # Allocation rule
//!
//! Areas are visited in descending `severity * population` order (ties
//! keep their input order). Every area's weight is its share of the total
//! weight of the assessment. For each resource kind, in [`ResourceKind`]
//! order, the area receives `floor(remaining * weight / total)` and the
//! remainder shrinks by that amount. Weights are never renormalised as
//! areas are served, so the leftover after the last area stays in stock.

use std::collections::BTreeMap;
use std::sync::Arc;

use relief_core::{Agent, AgentCore, AgentDirectory, Bus, BusEvent, ResourceWriter};
use relief_types::{
    AgentId, AllocationPlan, AreaAllocation, AreaDemand, Message, Payload, ResourceKind,
};
use tracing::{error, info};

use crate::error::AllocationError;

/// Order areas by descending priority weight.
///
/// The sort is stable: areas with equal weight keep their input order.
pub fn prioritize(areas: &[AreaDemand]) -> Vec<AreaDemand> {
    let mut sorted = areas.to_vec();
    sorted.sort_by_key(|a| std::cmp::Reverse(a.priority_weight()));
    sorted
}

/// Compute a single-pass weighted allocation of `inventory` across `areas`.
///
/// Every area appears in the result, in priority order, even when it
/// receives nothing (zero weight, or zero total weight). For every kind
/// the allocated sum never exceeds the inventory quantity.
pub fn allocate(
    areas: &[AreaDemand],
    inventory: &BTreeMap<ResourceKind, u32>,
) -> Result<AllocationPlan, AllocationError> {
    let ordered = prioritize(areas);

    let mut total_weight: u128 = 0;
    for area in &ordered {
        total_weight = total_weight
            .checked_add(u128::from(area.priority_weight()))
            .ok_or(AllocationError::WeightOverflow)?;
    }

    let mut remaining = inventory.clone();
    let mut plan = AllocationPlan::default();

    for area in &ordered {
        let mut entry = AreaAllocation {
            area: area.name.clone(),
            resources: BTreeMap::new(),
        };
        let weight = u128::from(area.priority_weight());

        if total_weight > 0 && weight > 0 {
            for (kind, left) in &mut remaining {
                let share = weighted_share(*kind, *left, weight, total_weight)?;
                if share == 0 {
                    continue;
                }
                *left = left
                    .checked_sub(share)
                    .ok_or_else(|| AllocationError::ArithmeticOverflow {
                        resource: *kind,
                        context: format!("share {share} exceeds remaining {left}"),
                    })?;
                entry.resources.insert(*kind, share);
            }
        }

        plan.areas.push(entry);
    }

    Ok(plan)
}

/// `floor(remaining * weight / total)` in exact integer arithmetic.
fn weighted_share(
    kind: ResourceKind,
    remaining: u32,
    weight: u128,
    total: u128,
) -> Result<u32, AllocationError> {
    let overflow = |context: &str| AllocationError::ArithmeticOverflow {
        resource: kind,
        context: context.to_owned(),
    };
    let scaled = u128::from(remaining)
        .checked_mul(weight)
        .ok_or_else(|| overflow("remaining * weight"))?;
    let share = scaled
        .checked_div(total)
        .ok_or_else(|| overflow("division by total weight"))?;
    // weight <= total, so share <= remaining.
    u32::try_from(share)
        .ok()
        .ok_or_else(|| overflow("share exceeds u32"))
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Turns need assessments into allocation plans.
#[derive(Debug)]
pub struct CoordinationAgent {
    core: AgentCore,
    resources: ResourceWriter,
    initial_inventory: BTreeMap<ResourceKind, u32>,
    distribution: AgentId,
    assessment: AgentId,
    priority_areas: Vec<AreaDemand>,
    current_plan: Option<AllocationPlan>,
}

impl CoordinationAgent {
    /// Create the agent. `initial_inventory` is written to the shared
    /// context when the agent starts.
    pub fn new(
        directory: &AgentDirectory,
        bus: Arc<Bus>,
        resources: ResourceWriter,
        initial_inventory: BTreeMap<ResourceKind, u32>,
    ) -> Self {
        Self {
            core: AgentCore::new(directory.coordinator.clone(), "Relief Coordinator", bus),
            resources,
            initial_inventory,
            distribution: directory.distribution.clone(),
            assessment: directory.assessment.clone(),
            priority_areas: Vec::new(),
            current_plan: None,
        }
    }

    /// Areas of the last assessment, highest priority first.
    pub fn priority_areas(&self) -> &[AreaDemand] {
        &self.priority_areas
    }

    /// The most recently generated plan.
    pub const fn current_plan(&self) -> Option<&AllocationPlan> {
        self.current_plan.as_ref()
    }

    fn handle_assessment(&mut self, area_data: &[AreaDemand]) {
        self.priority_areas = prioritize(area_data);
        info!(
            agent = %self.id(),
            areas = self.priority_areas.len(),
            "Prioritized areas"
        );

        let inventory = self.resources.levels();
        let plan = match allocate(&self.priority_areas, &inventory) {
            Ok(plan) => plan,
            Err(e) => {
                error!(agent = %self.id(), error = %e, "Allocation failed, assessment dropped");
                return;
            }
        };

        self.core.emit(&BusEvent::PlanGenerated {
            agent: self.id().clone(),
            areas: plan.areas.len(),
            allocations: plan.entry_count(),
        });
        self.current_plan = Some(plan.clone());
        let to = self.distribution.clone();
        self.send(to, Payload::NewAllocationPlan { plan });
    }
}

impl Agent for CoordinationAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn on_message(&mut self, message: &Message) {
        match message.content() {
            Payload::NeedAssessment { area_data } => self.handle_assessment(area_data),
            Payload::NewAllocationPlan { .. }
            | Payload::Alert(_)
            | Payload::EmergencyAlert(_)
            | Payload::NewData { .. }
            | Payload::RequestAreaAssessment { .. }
            | Payload::VolunteerStatus { .. }
            | Payload::CommunicationSystemStatus { .. }
            | Payload::Unrecognized => {}
        }
    }

    fn on_start(&mut self) {
        self.resources.update(&self.initial_inventory);
        info!(
            agent = %self.id(),
            kinds = self.initial_inventory.len(),
            "Resources initialized"
        );

        let situation = self.resources.context().situation();
        let request = Payload::RequestAreaAssessment {
            disaster_type: situation.disaster_type.clone(),
            location: situation.location.clone(),
        };
        let to = self.assessment.clone();
        self.send(to, request);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::{Mutex, PoisonError};

    use relief_core::{FnHandler, MemorySink, SharedContext};
    use relief_types::Situation;

    use super::*;

    fn area(name: &str, severity: u8, population: u32) -> AreaDemand {
        AreaDemand {
            name: name.to_owned(),
            severity,
            population,
            needs: BTreeSet::new(),
        }
    }

    fn inventory(pairs: &[(ResourceKind, u32)]) -> BTreeMap<ResourceKind, u32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn prioritize_is_descending_and_stable() {
        let areas = vec![area("A", 2, 100), area("B", 9, 50), area("C", 1, 200)];
        let names: Vec<String> = prioritize(&areas).into_iter().map(|a| a.name).collect();
        // A and C both weigh 200 and keep their input order.
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn heavier_area_is_served_first_under_scarcity() {
        let areas = vec![area("A", 2, 100), area("B", 9, 50)];
        let inv = inventory(&[(ResourceKind::Food, 7)]);

        let plan = allocate(&areas, &inv).unwrap();

        assert_eq!(plan.areas.first().map(|a| a.area.as_str()), Some("B"));
        let b = plan.quantity("B", ResourceKind::Food);
        let a = plan.quantity("A", ResourceKind::Food);
        // floor(7 * 450 / 650) for B, then the remaining 3 to A.
        assert_eq!((b, a), (4, 3));
        assert!(b >= 7 / 2);
        assert!(b >= a);
    }

    #[test]
    fn reference_allocation() {
        let areas = vec![area("B", 2, 1000), area("A", 8, 5000)];
        let inv = inventory(&[(ResourceKind::Food, 1000), (ResourceKind::Water, 5000)]);

        let plan = allocate(&areas, &inv).unwrap();

        assert_eq!(plan.areas.first().map(|a| a.area.as_str()), Some("A"));
        assert_eq!(plan.quantity("A", ResourceKind::Food), 952);
        assert_eq!(plan.quantity("B", ResourceKind::Food), 2);
        assert_eq!(plan.quantity("A", ResourceKind::Water), 4761);
        assert_eq!(plan.quantity("B", ResourceKind::Water), 11);
    }

    #[test]
    fn allocation_never_exceeds_inventory() {
        let areas = vec![
            area("A", 10, 9_999),
            area("B", 7, 4_321),
            area("C", 3, 100),
            area("D", 1, 1),
        ];
        let inv = inventory(&[
            (ResourceKind::Food, 1000),
            (ResourceKind::Water, 5000),
            (ResourceKind::MedicalSupplies, 500),
            (ResourceKind::ShelterKits, 200),
            (ResourceKind::Blankets, 7),
        ]);

        let plan = allocate(&areas, &inv).unwrap();
        for (kind, quantity) in &inv {
            assert!(plan.total(*kind) <= u64::from(*quantity), "{kind} overallocated");
        }
    }

    #[test]
    fn zero_total_weight_yields_empty_entries() {
        let areas = vec![area("A", 0, 100), area("B", 5, 0)];
        let inv = inventory(&[(ResourceKind::Food, 1000)]);

        let plan = allocate(&areas, &inv).unwrap();
        assert_eq!(plan.areas.len(), 2);
        assert_eq!(plan.entry_count(), 0);
    }

    #[test]
    fn invalid_area_receives_nothing() {
        let areas = vec![area("A", 11, 100), area("B", 5, 100)];
        let inv = inventory(&[(ResourceKind::Food, 100)]);

        let plan = allocate(&areas, &inv).unwrap();
        assert_eq!(plan.quantity("B", ResourceKind::Food), 100);
        assert!(plan.area("A").is_some_and(BTreeMap::is_empty));
    }

    #[test]
    fn shortfall_yields_small_or_omitted_allocations() {
        let areas = vec![area("A", 5, 100), area("B", 5, 100), area("C", 5, 100)];
        let inv = inventory(&[(ResourceKind::ShelterKits, 2)]);

        let plan = allocate(&areas, &inv).unwrap();
        // 2/3 floors to zero for every area.
        assert_eq!(plan.entry_count(), 0);
        assert_eq!(plan.areas.len(), 3);
    }

    #[test]
    fn allocation_is_deterministic() {
        let areas = vec![area("X", 4, 700), area("Y", 6, 300), area("Z", 4, 700)];
        let inv = inventory(&[(ResourceKind::Water, 777), (ResourceKind::Food, 333)]);
        assert_eq!(allocate(&areas, &inv).unwrap(), allocate(&areas, &inv).unwrap());
    }

    #[test]
    fn assessment_produces_plan_for_distribution() {
        let sink = Arc::new(MemorySink::new());
        let bus = Arc::new(Bus::new(relief_core::DEFAULT_MAX_HOPS, sink.clone()));
        let ctx = SharedContext::new(Situation {
            disaster_type: "earthquake".to_owned(),
            location: "Los Angeles".to_owned(),
            severity: 8,
        });
        let directory = AgentDirectory::default();

        let received = Arc::new(Mutex::new(Vec::new()));
        let inbox = Arc::clone(&received);
        bus.register(
            directory.distribution.clone(),
            Arc::new(Mutex::new(FnHandler(move |m: &Message| {
                inbox
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(m.clone());
            }))),
        );

        let agent = Arc::new(Mutex::new(CoordinationAgent::new(
            &directory,
            Arc::clone(&bus),
            ctx.claim_resources().unwrap(),
            inventory(&[(ResourceKind::Food, 1000)]),
        )));
        bus.register(directory.coordinator.clone(), agent.clone());

        // Assessment agent is not registered: the request is unroutable.
        let report = bus.start_agent(&directory.coordinator).unwrap();
        assert_eq!(report.unroutable, vec![directory.assessment.clone()]);
        assert_eq!(ctx.resources().get(&ResourceKind::Food), Some(&1000));

        bus.publish(Message::new(
            directory.assessment.clone(),
            directory.coordinator.clone(),
            Payload::NeedAssessment {
                area_data: vec![area("A", 8, 5000), area("B", 2, 1000)],
            },
        ));

        let inbox = received.lock().unwrap();
        assert_eq!(inbox.len(), 1);
        let plan = inbox
            .first()
            .and_then(|m| match m.content() {
                Payload::NewAllocationPlan { plan } => Some(plan.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(plan.quantity("A", ResourceKind::Food), 952);
        assert_eq!(
            agent.lock().unwrap().current_plan().map(AllocationPlan::entry_count),
            Some(2)
        );
        assert_eq!(
            sink.count(|e| matches!(e, BusEvent::PlanGenerated { areas: 2, .. })),
            1
        );
    }
}
