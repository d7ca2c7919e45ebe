//! Bus messages and their payloads.
//!
//! A [`Message`] is immutable once built: fields are private and only
//! exposed through accessors. The [`Payload`] enum is closed; agents match
//! it exhaustively with an explicit no-op arm for kinds they do not handle.
//! Payloads with an unknown `type` tag deserialize to
//! [`Payload::Unrecognized`] instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{DataSource, SystemStatus};
use crate::ids::{AgentId, MessageId};
use crate::structs::{AlertNotice, AllocationPlan, AreaDemand, Reading};

/// Content of a bus message, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Assessed demand for a set of areas.
    NeedAssessment {
        /// The assessed areas, in assessment order.
        area_data: Vec<AreaDemand>,
    },
    /// A freshly computed allocation plan.
    NewAllocationPlan {
        /// The plan.
        plan: AllocationPlan,
    },
    /// High-risk alert raised by the assessment agent.
    Alert(AlertNotice),
    /// Normalized alert fanned out by the broadcast agent.
    EmergencyAlert(AlertNotice),
    /// A raw sample from a data feed.
    NewData {
        /// The originating feed.
        source: DataSource,
        /// Sample fields.
        data: Reading,
    },
    /// Request for a fresh area assessment.
    RequestAreaAssessment {
        /// Kind of disaster.
        disaster_type: String,
        /// Where it happened.
        location: String,
    },
    /// Volunteer roster size report.
    VolunteerStatus {
        /// Number of registered volunteers.
        total_volunteers: u32,
    },
    /// Communication subsystem status report.
    CommunicationSystemStatus {
        /// Subsystem health.
        status: SystemStatus,
        /// Number of receivers on the roster.
        teams_connected: u32,
    },
    /// Any payload whose tag this build does not know.
    #[serde(other)]
    Unrecognized,
}

impl Payload {
    /// The wire tag of this payload, for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NeedAssessment { .. } => "need_assessment",
            Self::NewAllocationPlan { .. } => "new_allocation_plan",
            Self::Alert(_) => "alert",
            Self::EmergencyAlert(_) => "emergency_alert",
            Self::NewData { .. } => "new_data",
            Self::RequestAreaAssessment { .. } => "request_area_assessment",
            Self::VolunteerStatus { .. } => "volunteer_status",
            Self::CommunicationSystemStatus { .. } => "communication_system_status",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// An addressed, timestamped message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    from: AgentId,
    to: AgentId,
    timestamp: DateTime<Utc>,
    content: Payload,
}

impl Message {
    /// Build a message stamped with the current time.
    pub fn new(from: AgentId, to: AgentId, content: Payload) -> Self {
        Self::at(from, to, content, Utc::now())
    }

    /// Build a message with an explicit timestamp.
    pub fn at(from: AgentId, to: AgentId, content: Payload, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::new(),
            from,
            to,
            timestamp,
            content,
        }
    }

    /// Unique message id.
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Sender address.
    pub const fn sender(&self) -> &AgentId {
        &self.from
    }

    /// Recipient address.
    pub const fn recipient(&self) -> &AgentId {
        &self.to
    }

    /// Creation time.
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Payload.
    pub const fn content(&self) -> &Payload {
        &self.content
    }
}
