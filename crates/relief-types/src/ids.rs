//! Strongly-typed identifiers.
//!
//! Three families of identifiers are used across the workspace:
//!
//! - **Name ids** ([`AgentId`], [`VolunteerId`]) wrap a human-readable
//!   string. Agent ids are the bus addresses, so they must be stable and
//!   chosen by the driver.
//! - **Sequence ids** ([`TaskId`], [`PredictionId`]) wrap a monotonic
//!   counter owned by the agent that mints them. Two ids minted within the
//!   same clock instant never collide, and replaying the same input yields
//!   the same ids.
//! - **UUID ids** ([`MessageId`]) use UUID v7 (time-ordered) for values
//!   that only need to be unique, never reproducible.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Generates a newtype wrapper around a human-readable [`String`] name.
macro_rules! define_name_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any string-like value.
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(name.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self(name)
            }
        }
    };
}

/// Generates a newtype wrapper around a monotonic `u64` sequence number.
///
/// The `$prefix` literal is used by [`Display`](core::fmt::Display).
macro_rules! define_seq_id {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Return the raw sequence number.
            pub const fn sequence(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!($prefix, "_{:06}"), self.0)
            }
        }
    };
}

define_id! {
    /// Unique identifier for a message placed on the bus.
    MessageId
}

define_name_id! {
    /// Bus address of an agent (or of an external receiver such as a
    /// field team).
    AgentId
}

define_name_id! {
    /// Identifier of a volunteer registered with the distribution agent.
    VolunteerId
}

define_seq_id! {
    /// Identifier of a distribution task, unique per distribution agent.
    TaskId, "dist"
}

define_seq_id! {
    /// Identifier of a prediction, unique per assessment agent.
    PredictionId, "pred"
}

/// Monotonic generator for sequence ids.
///
/// The first id handed out is `1`. The counter saturates at `u64::MAX`
/// rather than wrapping, so ids never repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    last: u64,
}

impl Sequence {
    /// Create a generator whose first value is `1`.
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Advance the counter and return the new value.
    pub const fn next_value(&mut self) -> u64 {
        self.last = self.last.saturating_add(1);
        self.last
    }

    /// The most recently issued value (`0` before the first call).
    pub const fn last(&self) -> u64 {
        self.last
    }
}
