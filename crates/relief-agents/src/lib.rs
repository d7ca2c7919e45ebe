//! The four Relief agents.
//!
//! Each agent embeds a [`relief_core::AgentCore`], owns at most one field
//! of the [`relief_core::SharedContext`], and talks to its peers only
//! through the bus.
//!
//! # Modules
//!
//! - [`coordination`] -- Weighted allocation pass and the coordination agent
//! - [`distribution`] -- Volunteer roster, skill index, and task queue
//! - [`assessment`] -- Sample logs, predictions, alerts, and area assessments
//! - [`broadcast`] -- Receiver roster and alert fan-out
//! - [`error`] -- Allocation error types

pub mod assessment;
pub mod broadcast;
pub mod coordination;
pub mod distribution;
pub mod error;

pub use assessment::{AreaSource, AssessmentAgent, FixedAreaSource, WIND_SPEED};
pub use broadcast::{BroadcastAgent, normalize_alert};
pub use coordination::{CoordinationAgent, allocate, prioritize};
pub use distribution::DistributionAgent;
pub use error::AllocationError;
