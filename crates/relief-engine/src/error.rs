//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup and the demo run so
//! `main` can propagate with `?`.

use relief_types::AgentId;

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: relief_core::ConfigError,
    },

    /// A context field was claimed twice.
    #[error("context error: {source}")]
    Context {
        /// The underlying context error.
        #[from]
        source: relief_core::ContextError,
    },

    /// The `demo` section of the config file could not be read.
    #[error("demo config error: {message}")]
    Demo {
        /// Description of the failure.
        message: String,
    },

    /// An agent the driver tried to start has no handler on the bus.
    #[error("agent not registered: {0}")]
    NotRegistered(AgentId),
}
