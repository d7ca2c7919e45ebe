//! Process-wide shared context with single-writer fields.
//!
//! The [`SharedContext`] is created once by the driver and handed to every
//! agent as an `Arc`. The situation parameters are immutable. Each mutable
//! field (inventory, volunteer roster, receiver roster) can be claimed by
//! exactly one writer; the claim returns a typed writer handle and a
//! second claim fails with [`ContextError::AlreadyClaimed`]. Everyone else
//! reads copies, either per field or as one consistent [`ContextSnapshot`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use relief_types::{AgentId, Receiver, ResourceKind, Situation, Volunteer, VolunteerId};

/// A mutable field of the shared context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContextField {
    /// Resource inventory levels.
    Resources,
    /// Volunteer roster.
    Volunteers,
    /// Alert receiver roster.
    Receivers,
}

/// Errors raised by the shared context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The field already has a writer.
    #[error("context field {0:?} already has a writer")]
    AlreadyClaimed(ContextField),
}

/// A point-in-time copy of the whole context, taken under all read locks.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    /// Situation parameters.
    pub situation: Situation,
    /// Inventory levels.
    pub resources: BTreeMap<ResourceKind, u32>,
    /// Volunteer roster.
    pub volunteers: BTreeMap<VolunteerId, Volunteer>,
    /// Receiver roster.
    pub receivers: BTreeMap<AgentId, Receiver>,
}

/// State shared by reference across all agents.
#[derive(Debug)]
pub struct SharedContext {
    situation: Situation,
    resources: RwLock<BTreeMap<ResourceKind, u32>>,
    volunteers: RwLock<BTreeMap<VolunteerId, Volunteer>>,
    receivers: RwLock<BTreeMap<AgentId, Receiver>>,
    claimed: Mutex<BTreeSet<ContextField>>,
}

/// Acquire a read guard, recovering from poisoning.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquire a write guard, recovering from poisoning.
fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl SharedContext {
    /// Create an empty context for `situation`.
    pub fn new(situation: Situation) -> Arc<Self> {
        Arc::new(Self {
            situation,
            resources: RwLock::new(BTreeMap::new()),
            volunteers: RwLock::new(BTreeMap::new()),
            receivers: RwLock::new(BTreeMap::new()),
            claimed: Mutex::new(BTreeSet::new()),
        })
    }

    /// Immutable situation parameters.
    pub const fn situation(&self) -> &Situation {
        &self.situation
    }

    /// Copy of the inventory levels.
    pub fn resources(&self) -> BTreeMap<ResourceKind, u32> {
        read(&self.resources).clone()
    }

    /// Copy of the volunteer roster.
    pub fn volunteers(&self) -> BTreeMap<VolunteerId, Volunteer> {
        read(&self.volunteers).clone()
    }

    /// Copy of the receiver roster.
    pub fn receivers(&self) -> BTreeMap<AgentId, Receiver> {
        read(&self.receivers).clone()
    }

    /// A consistent copy of every field.
    ///
    /// Locks are taken in a fixed order (resources, volunteers, receivers)
    /// and held together, so no field is observed mid-update relative to
    /// the others.
    pub fn snapshot(&self) -> ContextSnapshot {
        let resources = read(&self.resources);
        let volunteers = read(&self.volunteers);
        let receivers = read(&self.receivers);
        ContextSnapshot {
            situation: self.situation.clone(),
            resources: resources.clone(),
            volunteers: volunteers.clone(),
            receivers: receivers.clone(),
        }
    }

    /// Become the sole writer of the inventory.
    pub fn claim_resources(self: &Arc<Self>) -> Result<ResourceWriter, ContextError> {
        self.claim(ContextField::Resources)?;
        Ok(ResourceWriter {
            context: Arc::clone(self),
        })
    }

    /// Become the sole writer of the volunteer roster.
    pub fn claim_volunteers(self: &Arc<Self>) -> Result<VolunteerWriter, ContextError> {
        self.claim(ContextField::Volunteers)?;
        Ok(VolunteerWriter {
            context: Arc::clone(self),
        })
    }

    /// Become the sole writer of the receiver roster.
    pub fn claim_receivers(self: &Arc<Self>) -> Result<ReceiverWriter, ContextError> {
        self.claim(ContextField::Receivers)?;
        Ok(ReceiverWriter {
            context: Arc::clone(self),
        })
    }

    fn claim(&self, field: ContextField) -> Result<(), ContextError> {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        if claimed.insert(field) {
            Ok(())
        } else {
            Err(ContextError::AlreadyClaimed(field))
        }
    }
}

/// Exclusive write access to the inventory.
#[derive(Debug)]
pub struct ResourceWriter {
    context: Arc<SharedContext>,
}

impl ResourceWriter {
    /// Merge `levels` into the inventory; listed kinds are overwritten,
    /// others are kept.
    pub fn update(&self, levels: &BTreeMap<ResourceKind, u32>) {
        let mut resources = write(&self.context.resources);
        for (kind, quantity) in levels {
            resources.insert(*kind, *quantity);
        }
    }

    /// Current inventory levels.
    pub fn levels(&self) -> BTreeMap<ResourceKind, u32> {
        self.context.resources()
    }

    /// The context this writer belongs to.
    pub const fn context(&self) -> &Arc<SharedContext> {
        &self.context
    }
}

/// Exclusive write access to the volunteer roster.
#[derive(Debug)]
pub struct VolunteerWriter {
    context: Arc<SharedContext>,
}

impl VolunteerWriter {
    /// Insert or replace a volunteer.
    pub fn upsert(&self, volunteer: Volunteer) {
        write(&self.context.volunteers).insert(volunteer.id.clone(), volunteer);
    }

    /// Set a volunteer's availability. Returns `false` if unknown.
    pub fn set_available(&self, id: &VolunteerId, available: bool) -> bool {
        write(&self.context.volunteers)
            .get_mut(id)
            .map(|v| v.available = available)
            .is_some()
    }

    /// The context this writer belongs to.
    pub const fn context(&self) -> &Arc<SharedContext> {
        &self.context
    }
}

/// Exclusive write access to the receiver roster.
#[derive(Debug)]
pub struct ReceiverWriter {
    context: Arc<SharedContext>,
}

impl ReceiverWriter {
    /// Insert or replace a receiver.
    pub fn upsert(&self, receiver: Receiver) {
        write(&self.context.receivers).insert(receiver.id.clone(), receiver);
    }

    /// The context this writer belongs to.
    pub const fn context(&self) -> &Arc<SharedContext> {
        &self.context
    }
}
