//! Shared type definitions for the Relief coordination agents.
//!
//! This crate is the single source of truth for the data exchanged between
//! agents over the bus. It has no behavior beyond small derived
//! computations (priority weight, plan totals).
//!
//! # Modules
//!
//! - [`ids`] -- Name, sequence, and UUID identifier newtypes
//! - [`enums`] -- Resource kinds, skills, sources, and status enums
//! - [`structs`] -- Demand, allocation, task, volunteer, and prediction structs
//! - [`message`] -- The bus [`Message`] and its tagged [`Payload`]

pub mod enums;
pub mod ids;
pub mod message;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{DataSource, PredictionKind, ResourceKind, Skill, SystemStatus, TaskKind, TaskStatus};
pub use ids::{AgentId, MessageId, PredictionId, Sequence, TaskId, VolunteerId};
pub use message::{Message, Payload};
pub use structs::{
    AlertNotice, AllocationPlan, AreaAllocation, AreaDemand, Coordinates, MAX_RISK_LEVEL,
    Prediction, Reading, Receiver, SEVERITY_RANGE, Sample, Situation, Task, Volunteer,
};
