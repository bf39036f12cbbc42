//! Module system for plugging gameplay logic into the world.
//!
//! Modules receive every delivered [`Event`] and every synchronous
//! [`BeforeInsert`] notification through the [`Module`] trait, together with
//! a [`ModuleContext`] that exposes the material ledger, power state and the
//! event bus. Modules can optionally export/import their state so it can be
//! replicated to clients.

use crate::event::{BeforeInsert, Event, EventBus};
use crate::id::EntityId;
use crate::ledger::MaterialLedger;
use crate::power::PowerState;

// ---------------------------------------------------------------------------
// Module trait
// ---------------------------------------------------------------------------

/// A gameplay module that reacts to world notifications.
///
/// The default implementations of every hook are no-ops, so modules only
/// need to override the notifications they care about.
pub trait Module: std::fmt::Debug {
    /// The human-readable name of this module, used for lookup and debugging.
    fn name(&self) -> &str;

    /// Called for every delivered event, in FIFO order.
    fn on_event(&mut self, target: EntityId, event: &Event, ctx: &mut ModuleContext<'_>) {
        let _ = (target, event, ctx);
    }

    /// Called before a material entity is inserted into `target`. Set
    /// `args.handled` to take over the insertion.
    fn before_insert(
        &mut self,
        target: EntityId,
        args: &mut BeforeInsert,
        ctx: &mut ModuleContext<'_>,
    ) {
        let _ = (target, args, ctx);
    }

    /// Serialize this module's state for replication.
    /// Returns an empty vec by default (stateless module).
    fn serialize_state(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Load previously serialized state. Returns `Ok(())` by default (no-op).
    fn load_state(&mut self, _data: &[u8]) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Downcast to `&dyn Any` for type-safe access to concrete module types.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to `&mut dyn Any` for type-safe mutable access to concrete module types.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

// ---------------------------------------------------------------------------
// ModuleContext
// ---------------------------------------------------------------------------

/// Mutable context passed to module hooks.
pub struct ModuleContext<'a> {
    /// Material ledgers of every entity.
    pub ledger: &'a mut dyn MaterialLedger,
    /// Power state of every entity.
    pub power: &'a dyn PowerState,
    /// The event bus, for re-raising notifications on other entities.
    pub events: &'a mut EventBus,
}

// ---------------------------------------------------------------------------
// ModuleError
// ---------------------------------------------------------------------------

/// Errors that can occur during module operations.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// Failed to deserialize module state from replicated data.
    #[error("deserialize failed: {0}")]
    DeserializeFailed(String),
    /// Deserialized state violates a module invariant.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
    /// A module with the given name was not found.
    #[error("module not found: {0}")]
    NotFound(String),
}
