//! Runtime plumbing shared by every Relief agent.
//!
//! Agents never call each other. They publish addressed messages on the
//! [`Bus`], read the [`SharedContext`], and report lifecycle milestones to
//! an [`EventSink`].
//!
//! # Modules
//!
//! - [`bus`] -- Address-based router with breadth-first cascade draining
//! - [`agent`] -- The [`Agent`] contract and the [`AgentCore`] every agent embeds
//! - [`context`] -- Shared situation, inventory, and rosters with single writers
//! - [`sink`] -- Lifecycle events and their sinks
//! - [`config`] -- YAML configuration loading

pub mod agent;
pub mod bus;
pub mod config;
pub mod context;
pub mod sink;

pub use agent::{Agent, AgentCore, MAX_HISTORY};
pub use bus::{Bus, DEFAULT_MAX_HOPS, DeliveryReport, FnHandler, Handler, SharedHandler};
pub use config::{
    AgentDirectory, AssessmentConfig, BusConfig, ConfigError, DistributionConfig, LogFormat,
    LoggingConfig, ReliefConfig, SituationConfig,
};
pub use context::{
    ContextError, ContextField, ContextSnapshot, ReceiverWriter, ResourceWriter, SharedContext,
    VolunteerWriter,
};
pub use sink::{BusEvent, EventSink, MemorySink, NoOpSink, TracingSink};
