//! Error types for the relief-agents crate.
//!
//! Agent handlers never return errors to the bus. These types surface from
//! the pure operations (allocation) and are logged and swallowed by the
//! handler that called them.

use relief_types::ResourceKind;

/// Errors that can occur while computing an allocation plan.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// An intermediate product or sum left its integer range.
    #[error("arithmetic overflow while allocating {resource}: {context}")]
    ArithmeticOverflow {
        /// The resource kind being allocated.
        resource: ResourceKind,
        /// Description of what was being computed.
        context: String,
    },

    /// The sum of all area weights does not fit in 128 bits.
    #[error("total priority weight overflowed")]
    WeightOverflow,
}
