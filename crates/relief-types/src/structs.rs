//! Core data structs exchanged between agents.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{DataSource, PredictionKind, ResourceKind, Skill, TaskKind, TaskStatus};
use crate::ids::{AgentId, PredictionId, TaskId, VolunteerId};

/// Inclusive bounds on an area's severity score.
pub const SEVERITY_RANGE: core::ops::RangeInclusive<u8> = 1..=10;

/// Inclusive bounds on a prediction's risk level.
pub const MAX_RISK_LEVEL: u8 = 10;

// ---------------------------------------------------------------------------
// Situation
// ---------------------------------------------------------------------------

/// Immutable parameters of the disaster being responded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Situation {
    /// Kind of disaster (e.g. "earthquake").
    pub disaster_type: String,
    /// Where it happened.
    pub location: String,
    /// Overall severity on the 1--10 scale.
    pub severity: u8,
}

// ---------------------------------------------------------------------------
// Demand and allocation
// ---------------------------------------------------------------------------

/// Demand signal for a single affected area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaDemand {
    /// Area name, used as the allocation key and task location.
    pub name: String,
    /// Severity score, valid within [`SEVERITY_RANGE`].
    pub severity: u8,
    /// Number of people affected.
    pub population: u32,
    /// Resource kinds the area reports needing.
    pub needs: BTreeSet<ResourceKind>,
}

impl AreaDemand {
    /// Whether severity and population are inside their valid ranges.
    pub fn is_valid(&self) -> bool {
        SEVERITY_RANGE.contains(&self.severity) && self.population > 0
    }

    /// Priority weight `severity * population`.
    ///
    /// Areas outside the valid ranges weigh zero and therefore receive
    /// nothing.
    pub fn priority_weight(&self) -> u64 {
        if !self.is_valid() {
            return 0;
        }
        u64::from(self.severity).saturating_mul(u64::from(self.population))
    }
}

/// The quantities allocated to one area.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaAllocation {
    /// Area name copied from the [`AreaDemand`].
    pub area: String,
    /// Allocated quantity per resource kind. Zero allocations are omitted.
    pub resources: BTreeMap<ResourceKind, u32>,
}

/// Distribution plan: per-area resource quantities in priority order.
///
/// Areas keep the order the coordination agent visited them in, so the
/// first entry is the highest-priority area. Every assessed area has an
/// entry, possibly with no resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Per-area allocations, highest priority first.
    pub areas: Vec<AreaAllocation>,
}

impl AllocationPlan {
    /// Resources allocated to the named area, if it is in the plan.
    pub fn area(&self, name: &str) -> Option<&BTreeMap<ResourceKind, u32>> {
        self.areas
            .iter()
            .find(|a| a.area == name)
            .map(|a| &a.resources)
    }

    /// Quantity of `kind` allocated to `area` (zero if absent).
    pub fn quantity(&self, area: &str, kind: ResourceKind) -> u32 {
        self.area(area)
            .and_then(|r| r.get(&kind))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of `kind` across all areas.
    pub fn total(&self, kind: ResourceKind) -> u64 {
        self.areas
            .iter()
            .filter_map(|a| a.resources.get(&kind))
            .fold(0u64, |acc, q| acc.saturating_add(u64::from(*q)))
    }

    /// Every `(area, kind, quantity)` triple in plan order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, ResourceKind, u32)> {
        self.areas.iter().flat_map(|a| {
            a.resources
                .iter()
                .map(move |(kind, qty)| (a.area.as_str(), *kind, *qty))
        })
    }

    /// Number of `(area, kind)` pairs with a non-zero allocation.
    pub fn entry_count(&self) -> usize {
        self.areas.iter().map(|a| a.resources.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Tasks and volunteers
// ---------------------------------------------------------------------------

/// A unit of distribution work derived from one `(area, resource)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// What kind of work this is.
    pub kind: TaskKind,
    /// Human-readable summary.
    pub description: String,
    /// Destination area.
    pub location: String,
    /// Supplies to move.
    pub resources: BTreeMap<ResourceKind, u32>,
    /// Skills a worker must hold to take the task.
    pub required_skills: BTreeSet<Skill>,
    /// Scheduling priority (higher is more urgent).
    pub priority: u8,
    /// Lifecycle state.
    pub status: TaskStatus,
}

/// A registered volunteer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volunteer {
    /// Volunteer identifier.
    pub id: VolunteerId,
    /// Display name.
    pub name: String,
    /// Declared skills.
    pub skills: BTreeSet<Skill>,
    /// Where the volunteer is stationed.
    pub location: String,
    /// Whether the volunteer can take work right now.
    pub available: bool,
}

// ---------------------------------------------------------------------------
// Receivers
// ---------------------------------------------------------------------------

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

/// A downstream alert receiver such as a field team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    /// Bus address of the receiver.
    pub id: AgentId,
    /// Last reported position.
    pub location: Coordinates,
}

// ---------------------------------------------------------------------------
// Signals and predictions
// ---------------------------------------------------------------------------

/// Numeric fields of one raw sample, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading(BTreeMap<String, Decimal>);

impl Reading {
    /// Create an empty reading.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, field: &str, value: Decimal) -> Self {
        self.0.insert(field.to_owned(), value);
        self
    }

    /// Value of a field, if present.
    pub fn get(&self, field: &str) -> Option<Decimal> {
        self.0.get(field).copied()
    }

    /// Value of a field, or zero when missing.
    pub fn get_or_zero(&self, field: &str) -> Decimal {
        self.get(field).unwrap_or(Decimal::ZERO)
    }
}

/// A timestamped reading held in a source's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// When the reading was ingested.
    pub timestamp: DateTime<Utc>,
    /// The reading itself.
    pub data: Reading,
}

/// A risk prediction derived from recent samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// Unique prediction identifier.
    pub id: PredictionId,
    /// Which model produced it.
    pub kind: PredictionKind,
    /// The source the prediction was computed for.
    pub source: DataSource,
    /// Risk on the `0..=10` scale.
    pub risk_level: u8,
    /// Areas expected to be affected.
    pub areas_affected: Vec<String>,
    /// Suggested responses.
    pub recommended_actions: Vec<String>,
}

/// Alert content raised by the assessment agent and fanned out by the
/// broadcast agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNotice {
    /// The prediction kind that triggered the alert.
    pub alert_type: PredictionKind,
    /// Human-readable text.
    pub message: String,
    /// Risk on the `0..=10` scale.
    pub risk_level: u8,
    /// Areas expected to be affected.
    #[serde(default)]
    pub areas_affected: Vec<String>,
    /// Suggested responses.
    #[serde(default)]
    pub recommended_actions: Vec<String>,
}
