//! Enumeration types shared across the workspace.
//!
//! Every enum that is used as a map key derives `Ord`; the declaration
//! order is the iteration order of `BTreeMap`s keyed by it, which is what
//! keeps allocation and task generation reproducible.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A kind of relief supply held in inventory and allocated to areas.
///
/// The declaration order is the fixed visiting order used by the
/// allocation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Food rations.
    Food,
    /// Drinking water.
    Water,
    /// First-aid and medical supplies.
    MedicalSupplies,
    /// Emergency shelter kits.
    ShelterKits,
    /// Blankets.
    Blankets,
}

impl ResourceKind {
    /// All resource kinds in visiting order.
    pub const ALL: [Self; 5] = [
        Self::Food,
        Self::Water,
        Self::MedicalSupplies,
        Self::ShelterKits,
        Self::Blankets,
    ];

    /// The `snake_case` name used in configuration and task descriptions.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Water => "water",
            Self::MedicalSupplies => "medical_supplies",
            Self::ShelterKits => "shelter_kits",
            Self::Blankets => "blankets",
        }
    }
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

/// A capability a volunteer can offer and a task can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    /// Medical care and triage.
    Medical,
    /// Moving and distributing supplies.
    Logistics,
    /// Search and rescue.
    Rescue,
    /// Radio and public communication.
    Communication,
    /// Structural and utility engineering.
    Engineering,
}

impl Skill {
    /// All skills in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Medical,
        Self::Logistics,
        Self::Rescue,
        Self::Communication,
        Self::Engineering,
    ];
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// What a task asks a worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Deliver allocated supplies to an area.
    ResourceDistribution,
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued and waiting for a worker.
    Pending,
    /// Handed to a worker.
    Assigned,
}

// ---------------------------------------------------------------------------
// Signals and predictions
// ---------------------------------------------------------------------------

/// The feed a raw sample came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Weather station readings (`wind_speed`, `rainfall`).
    Weather,
    /// Any other named feed, carried on the wire as its bare name.
    /// Samples are logged but never significant.
    #[serde(untagged)]
    Other(String),
}

impl core::fmt::Display for DataSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Weather => f.write_str("weather"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// The model that produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    /// Derived from averaged weather samples.
    WeatherImpact,
    /// Falls back to the situation severity.
    General,
}

impl core::fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::WeatherImpact => f.write_str("weather_impact"),
            Self::General => f.write_str("general"),
        }
    }
}

/// Health of an agent subsystem as reported in status messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    /// Fully functional.
    Operational,
    /// Running with reduced capability.
    Degraded,
}
