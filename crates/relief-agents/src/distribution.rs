//! Distribution agent: volunteer roster, skill index, and task queue.
//!
//! The distribution agent owns the volunteer field of the shared context.
//! Every allocation plan it receives becomes one pending [`Task`] per
//! `(area, resource kind)` pair. Tasks are queued, never auto-assigned;
//! [`DistributionAgent::candidates_for`] answers who could take one.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use relief_core::{
    Agent, AgentCore, AgentDirectory, Bus, BusEvent, DistributionConfig, VolunteerWriter,
};
use relief_types::{
    AgentId, AllocationPlan, Message, Payload, Sequence, Skill, Task, TaskId, TaskKind,
    TaskStatus, Volunteer, VolunteerId,
};
use tracing::{debug, info, warn};

/// Matches volunteers to distribution work.
#[derive(Debug)]
pub struct DistributionAgent {
    core: AgentCore,
    volunteers: VolunteerWriter,
    broadcast: AgentId,
    config: DistributionConfig,
    /// Registered on start, then emptied.
    seed_roster: Vec<Volunteer>,
    roster: BTreeMap<VolunteerId, Volunteer>,
    skill_index: BTreeMap<Skill, BTreeSet<VolunteerId>>,
    pending: Vec<Task>,
    task_ids: Sequence,
}

impl DistributionAgent {
    /// Create the agent. `seed_roster` is registered when the agent starts.
    pub fn new(
        directory: &AgentDirectory,
        bus: Arc<Bus>,
        volunteers: VolunteerWriter,
        config: DistributionConfig,
        seed_roster: Vec<Volunteer>,
    ) -> Self {
        Self {
            core: AgentCore::new(directory.distribution.clone(), "Volunteer Coordinator", bus),
            volunteers,
            broadcast: directory.broadcast.clone(),
            config,
            seed_roster,
            roster: BTreeMap::new(),
            skill_index: BTreeMap::new(),
            pending: Vec::new(),
            task_ids: Sequence::new(),
        }
    }

    /// Add a volunteer to the roster and index them under each skill.
    ///
    /// Registering an id twice replaces the earlier entry; the old skills
    /// are removed from the index first so lookups never return stale
    /// matches.
    pub fn register(&mut self, volunteer: Volunteer) {
        let id = volunteer.id.clone();
        if let Some(previous) = self.roster.remove(&id) {
            warn!(agent = %self.id(), volunteer = %id, "Volunteer re-registered, replacing entry");
            for skill in &previous.skills {
                if let Some(ids) = self.skill_index.get_mut(skill) {
                    ids.remove(&id);
                }
            }
        }
        for skill in &volunteer.skills {
            self.skill_index
                .entry(*skill)
                .or_default()
                .insert(id.clone());
        }
        self.volunteers.upsert(volunteer.clone());
        self.roster.insert(id.clone(), volunteer);
        debug!(agent = %self.id(), volunteer = %id, "Registered volunteer");
    }

    /// Ids of available volunteers holding `skill`.
    pub fn available_with_skill(&self, skill: Skill) -> BTreeSet<VolunteerId> {
        self.skill_index
            .get(&skill)
            .into_iter()
            .flatten()
            .filter(|id| self.roster.get(*id).is_some_and(|v| v.available))
            .cloned()
            .collect()
    }

    /// Ids of available volunteers holding every skill `task` requires.
    pub fn candidates_for(&self, task: &Task) -> BTreeSet<VolunteerId> {
        self.roster
            .values()
            .filter(|v| v.available && task.required_skills.is_subset(&v.skills))
            .map(|v| v.id.clone())
            .collect()
    }

    /// Mark a volunteer available or unavailable. Returns `false` if the
    /// id is not on the roster.
    pub fn set_availability(&mut self, id: &VolunteerId, available: bool) -> bool {
        let Some(volunteer) = self.roster.get_mut(id) else {
            return false;
        };
        volunteer.available = available;
        self.volunteers.set_available(id, available)
    }

    /// The registered volunteers.
    pub const fn roster(&self) -> &BTreeMap<VolunteerId, Volunteer> {
        &self.roster
    }

    /// Queued tasks, oldest first.
    pub fn pending_tasks(&self) -> &[Task] {
        &self.pending
    }

    fn generate_tasks(&mut self, plan: &AllocationPlan) {
        let mut created: usize = 0;
        for (area, kind, quantity) in plan.entries() {
            let task = Task {
                id: TaskId(self.task_ids.next_value()),
                kind: TaskKind::ResourceDistribution,
                description: format!("Distribute {quantity} {kind} to {area}"),
                location: area.to_owned(),
                resources: BTreeMap::from([(kind, quantity)]),
                required_skills: self.config.default_skills.clone(),
                priority: self.config.baseline_priority,
                status: TaskStatus::Pending,
            };
            self.pending.push(task);
            created = created.saturating_add(1);
        }
        self.core.emit(&BusEvent::TasksGenerated {
            agent: self.id().clone(),
            count: created,
        });
    }
}

impl Agent for DistributionAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn on_message(&mut self, message: &Message) {
        match message.content() {
            Payload::NewAllocationPlan { plan } => self.generate_tasks(plan),
            Payload::NeedAssessment { .. }
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
        for volunteer in std::mem::take(&mut self.seed_roster) {
            self.register(volunteer);
        }
        info!(agent = %self.id(), count = self.roster.len(), "Registered volunteers");

        let total_volunteers = u32::try_from(self.roster.len()).unwrap_or(u32::MAX);
        let to = self.broadcast.clone();
        self.send(to, Payload::VolunteerStatus { total_volunteers });
    }
}
