//! Silo Core -- the host-side world that gameplay modules plug into.
//!
//! This crate provides the pieces a material-sharing feature needs from its
//! host engine: entity ids, per-entity material ledgers, power receivers,
//! device links, and an in-process event dispatcher.
//!
//! # Dispatch
//!
//! Gameplay logic is written as a [`module::Module`] and registered on the
//! [`world::World`]. Every public world operation runs to completion and
//! then delivers queued notifications FIFO to all modules, each receiving a
//! [`module::ModuleContext`] with mutable ledger access:
//!
//! ```rust,ignore
//! let mut world = World::new();
//! world.register_module(Box::new(MyModule::default()));
//! let lathe = world.spawn("lathe");
//! world.add_material_storage(lathe, MaterialStorage::new());
//! world.change_material_amount(lathe, &"steel".into(), 5); // delivers MaterialAmountChanged
//! ```
//!
//! # Key Types
//!
//! - [`world::World`] -- Entities, records, links and the dispatcher.
//! - [`ledger::MaterialLedger`] -- Ledger interface used by modules.
//! - [`power::PowerState`] -- Power interface used by modules.
//! - [`event::Event`] -- Entity-directed notifications.
//! - [`event::BeforeInsert`] -- Synchronous "about to insert" notification.

pub mod event;
pub mod id;
pub mod ledger;
pub mod module;
pub mod power;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
