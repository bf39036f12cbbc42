//! Convenience calls into a [`MaterialSiloSystem`] registered on a [`World`].
//!
//! Register the system with `world.register_module(Box::new(MaterialSiloSystem::new()))`
//! and then use [`SiloWorldExt`] to mark entities and to draw materials:
//!
//! ```rust,ignore
//! world.make_silo(silo);
//! world.make_utilizer(lathe);
//! world.link(silo, lathe);
//! let owed = world.silo_withdraw(lathe, &"steel".into(), 8);
//! ```
//!
//! Every call returns the "no silo system" fallback (false, `None`, or the
//! full requested amount) when no [`MaterialSiloSystem`] is registered.

use silo_core::id::{EntityId, MaterialKind};
use silo_core::world::World;

use crate::system::MaterialSiloSystem;

pub trait SiloWorldExt {
    /// Give `entity` a silo record.
    fn make_silo(&mut self, entity: EntityId) -> bool;

    /// Give `entity` a utilizer record.
    fn make_utilizer(&mut self, entity: EntityId) -> bool;

    /// The silo `utilizer` is connected to, powered or not.
    fn silo_of(&self, utilizer: EntityId) -> Option<EntityId>;

    /// Utilizers connected to `silo`.
    fn utilizers_of(&self, silo: EntityId) -> Vec<EntityId>;

    /// The silo `entity` would draw from right now.
    fn active_silo(&mut self, entity: EntityId) -> Option<EntityId>;

    /// See [`MaterialSiloSystem::withdraw`].
    fn silo_withdraw(&mut self, requester: EntityId, kind: &MaterialKind, amount: u32) -> u32;

    /// See [`MaterialSiloSystem::available`].
    fn silo_available(&mut self, entity: EntityId, kind: &MaterialKind) -> u64;

    /// See [`MaterialSiloSystem::consume`].
    fn silo_consume(&mut self, entity: EntityId, kind: &MaterialKind, amount: u32) -> bool;
}

impl SiloWorldExt for World {
    fn make_silo(&mut self, entity: EntityId) -> bool {
        self.contains(entity)
            && self
                .find_module_mut::<MaterialSiloSystem>()
                .is_some_and(|s| s.add_silo(entity))
    }

    fn make_utilizer(&mut self, entity: EntityId) -> bool {
        self.contains(entity)
            && self
                .find_module_mut::<MaterialSiloSystem>()
                .is_some_and(|s| s.add_utilizer(entity))
    }

    fn silo_of(&self, utilizer: EntityId) -> Option<EntityId> {
        self.find_module::<MaterialSiloSystem>()?
            .links()
            .silo_of(utilizer)
    }

    fn utilizers_of(&self, silo: EntityId) -> Vec<EntityId> {
        self.find_module::<MaterialSiloSystem>()
            .map(|s| s.links().utilizers_of(silo).to_vec())
            .unwrap_or_default()
    }

    fn active_silo(&mut self, entity: EntityId) -> Option<EntityId> {
        self.with_module(|s: &mut MaterialSiloSystem, ctx| {
            s.resolve_active_silo(entity, &*ctx.ledger, ctx.power)
        })
        .flatten()
    }

    fn silo_withdraw(&mut self, requester: EntityId, kind: &MaterialKind, amount: u32) -> u32 {
        self.with_module(|s: &mut MaterialSiloSystem, ctx| s.withdraw(ctx, requester, kind, amount))
            .unwrap_or(amount)
    }

    fn silo_available(&mut self, entity: EntityId, kind: &MaterialKind) -> u64 {
        self.with_module(|s: &mut MaterialSiloSystem, ctx| s.available(ctx, entity, kind))
            .unwrap_or_else(|| u64::from(self.material_amount(entity, kind)))
    }

    fn silo_consume(&mut self, entity: EntityId, kind: &MaterialKind, amount: u32) -> bool {
        self.with_module(|s: &mut MaterialSiloSystem, ctx| s.consume(ctx, entity, kind, amount))
            .unwrap_or_else(|| self.change_material_amount(entity, kind, -i64::from(amount)))
    }
}
