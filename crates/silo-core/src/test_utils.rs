//! Shared test helpers for unit and integration tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests and, via the `test-utils` feature, in other
//! crates' tests.

use crate::id::{EntityId, MaterialKind};
use crate::ledger::{MaterialLedger, MaterialStorage, PhysicalComposition};
use crate::power::PowerReceiver;
use crate::world::World;

/// Material units in a single sheet.
pub const SHEET_UNITS: u32 = 100;

// ===========================================================================
// Material kinds
// ===========================================================================

pub fn steel() -> MaterialKind {
    MaterialKind::from("steel")
}
pub fn glass() -> MaterialKind {
    MaterialKind::from("glass")
}
pub fn plastic() -> MaterialKind {
    MaterialKind::from("plastic")
}
pub fn gold() -> MaterialKind {
    MaterialKind::from("gold")
}

// ===========================================================================
// Entity builders
// ===========================================================================

/// Spawn a powered machine with an unlimited material storage.
pub fn spawn_machine(world: &mut World, name: &str) -> EntityId {
    spawn_machine_with(world, name, MaterialStorage::new())
}

/// Spawn a powered machine with the given material storage.
pub fn spawn_machine_with(world: &mut World, name: &str, storage: MaterialStorage) -> EntityId {
    let entity = world.spawn(name);
    world.add_material_storage(entity, storage);
    world.add_power_receiver(entity, PowerReceiver::default());
    entity
}

pub fn spawn_lathe(world: &mut World) -> EntityId {
    spawn_machine(world, "lathe")
}

/// Spawn a stack of `count` sheets of a single material.
pub fn spawn_sheets(world: &mut World, kind: MaterialKind, count: u32) -> EntityId {
    world.spawn_material(
        format!("sheet_{kind}"),
        PhysicalComposition::new(count).with_material(kind, SHEET_UNITS),
    )
}

// ===========================================================================
// Ledger helpers
// ===========================================================================

pub fn amount(world: &World, entity: EntityId, kind: &MaterialKind) -> u32 {
    world.ledger().get_amount(entity, kind)
}

/// Credit `qty` of `kind` to `entity`, panicking if refused.
pub fn give(world: &mut World, entity: EntityId, kind: &MaterialKind, qty: u32) {
    assert!(
        world.change_material_amount(entity, kind, i64::from(qty)),
        "ledger refused {qty} {kind}"
    );
}

/// Sum of `kind` across the given entities.
pub fn total_of(world: &World, entities: &[EntityId], kind: &MaterialKind) -> u64 {
    entities
        .iter()
        .map(|&e| u64::from(amount(world, e, kind)))
        .sum()
}
