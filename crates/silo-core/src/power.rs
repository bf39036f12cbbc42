//! Power receivers.
//!
//! Machines that draw power carry a [`PowerReceiver`]. The host's power grid
//! is out of scope here: receivers are switched on and off directly, and the
//! world raises a power-changed notification only on transitions.

use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

/// Power state of a single machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerReceiver {
    /// Whether the machine currently has power.
    pub powered: bool,
    /// Machines that do not need power always report powered.
    pub needs_power: bool,
}

impl Default for PowerReceiver {
    fn default() -> Self {
        Self {
            powered: true,
            needs_power: true,
        }
    }
}

impl PowerReceiver {
    pub fn unpowered() -> Self {
        Self {
            powered: false,
            needs_power: true,
        }
    }

    pub fn is_powered(&self) -> bool {
        self.powered || !self.needs_power
    }
}

/// Read access to per-entity power state.
pub trait PowerState {
    /// Whether `entity` currently reports powered.
    ///
    /// Entities without a power receiver do not depend on power and report
    /// powered.
    fn is_powered(&self, entity: EntityId) -> bool;
}

/// All power receivers in the world.
#[derive(Debug, Default)]
pub struct PowerReceivers {
    receivers: SecondaryMap<EntityId, PowerReceiver>,
}

impl PowerReceivers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityId, receiver: PowerReceiver) {
        self.receivers.insert(entity, receiver);
    }

    pub fn get(&self, entity: EntityId) -> Option<&PowerReceiver> {
        self.receivers.get(entity)
    }

    pub fn remove(&mut self, entity: EntityId) {
        self.receivers.remove(entity);
    }

    /// Switch a receiver on or off. Returns true if the reported power state
    /// changed. Entities without a receiver are left untouched.
    pub fn set_powered(&mut self, entity: EntityId, powered: bool) -> bool {
        let Some(receiver) = self.receivers.get_mut(entity) else {
            return false;
        };
        let before = receiver.is_powered();
        receiver.powered = powered;
        before != receiver.is_powered()
    }
}

impl PowerState for PowerReceivers {
    fn is_powered(&self, entity: EntityId) -> bool {
        self.receivers.get(entity).is_none_or(PowerReceiver::is_powered)
    }
}
