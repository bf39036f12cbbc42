//! The material silo system.
//!
//! [`MaterialSiloSystem`] owns the silo relation and reacts to world
//! notifications:
//!
//! | notification | target | effect |
//! |---|---|---|
//! | `NewLink` | utilizer (sink) | connect to the source silo, migrate materials, drop the old silo's link |
//! | `BeforeInsert` | utilizer | redirect the insertion into the active silo |
//! | `LinkRemoved` | utilizer (sink) | detach from the silo |
//! | `MaterialAmountChanged` | silo | re-raise on every connected utilizer |
//! | `EntityRemoved` | silo or utilizer | drop its records |
//!
//! Refused operations are silent: the handler logs at `debug` level and
//! leaves the host's default behaviour in place.

use log::{debug, trace};
use silo_core::event::{BeforeInsert, Event, EventBus};
use silo_core::id::{EntityId, MaterialKind};
use silo_core::ledger::MaterialLedger;
use silo_core::module::{Module, ModuleContext, ModuleError};
use silo_core::power::PowerState;

use crate::config::SiloConfig;
use crate::relation::{LinkRejection, SiloLinks};

/// Gameplay module pooling utilizer materials into linked silos.
#[derive(Debug, Default)]
pub struct MaterialSiloSystem {
    config: SiloConfig,
    links: SiloLinks,
}

impl MaterialSiloSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SiloConfig) -> Self {
        Self {
            config,
            links: SiloLinks::new(),
        }
    }

    pub fn config(&self) -> &SiloConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SiloConfig) {
        self.config = config;
    }

    pub fn links(&self) -> &SiloLinks {
        &self.links
    }

    /// Mark `entity` as a silo.
    pub fn add_silo(&mut self, entity: EntityId) -> bool {
        self.links.add_silo(entity)
    }

    /// Mark `entity` as a utilizer that can link to a silo.
    pub fn add_utilizer(&mut self, entity: EntityId) -> bool {
        self.links.add_utilizer(entity)
    }

    // -----------------------------------------------------------------------
    // Link establishment
    // -----------------------------------------------------------------------

    /// Connect `utilizer` to `silo` and move the utilizer's materials into
    /// the silo.
    ///
    /// Each material moves as one atomic transfer; a material the silo
    /// cannot take stays with the utilizer.
    pub fn link_utilizer(
        &mut self,
        utilizer: EntityId,
        silo: EntityId,
        ledger: &mut dyn MaterialLedger,
    ) -> Result<(), LinkRejection> {
        if utilizer == silo {
            return Err(LinkRejection::SelfLink(utilizer));
        }
        for entity in [utilizer, silo] {
            if !ledger.has_storage(entity) {
                return Err(LinkRejection::MissingStorage(entity));
            }
        }

        if let Some(previous) = self.links.connect(utilizer, silo)? {
            debug!("utilizer {utilizer:?} moved from silo {previous:?}");
        }
        debug!("utilizer {utilizer:?} linked to silo {silo:?}");

        if self.config.transfer_on_link {
            migrate_materials(utilizer, silo, ledger);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Insertion interception
    // -----------------------------------------------------------------------

    /// Redirect a pending insertion on `utilizer` into its active silo.
    ///
    /// Leaves `args` untouched when there is no active silo or the silo
    /// refuses the material, so the default insertion applies.
    pub fn intercept_insert(
        &self,
        utilizer: EntityId,
        args: &mut BeforeInsert,
        ledger: &mut dyn MaterialLedger,
        power: &dyn PowerState,
    ) {
        if args.handled {
            return;
        }
        let Some(silo) = self.resolve_active_silo(utilizer, &*ledger, power) else {
            return;
        };
        if ledger.insert_material_entity(args.user, args.item, silo, true) {
            debug!("insert of {:?} into {utilizer:?} redirected to silo {silo:?}", args.item);
            args.handled = true;
        }
    }

    // -----------------------------------------------------------------------
    // Link teardown
    // -----------------------------------------------------------------------

    /// Detach `utilizer` from its silo. Returns the silo it left; a second
    /// call returns `None`.
    pub fn unlink_utilizer(&mut self, utilizer: EntityId) -> Option<EntityId> {
        let silo = self.links.disconnect(utilizer)?;
        debug!("utilizer {utilizer:?} unlinked from silo {silo:?}");
        Some(silo)
    }

    // -----------------------------------------------------------------------
    // Silo resolution
    // -----------------------------------------------------------------------

    /// The silo `entity` should draw from right now: connected, still
    /// holding a ledger, and powered. The requester's own power does not
    /// matter.
    pub fn resolve_active_silo(
        &self,
        entity: EntityId,
        ledger: &dyn MaterialLedger,
        power: &dyn PowerState,
    ) -> Option<EntityId> {
        let silo = self.links.silo_of(entity)?;
        if !ledger.has_storage(silo) {
            return None;
        }
        if self.config.require_power && !power.is_powered(silo) {
            return None;
        }
        Some(silo)
    }

    // -----------------------------------------------------------------------
    // Deduction
    // -----------------------------------------------------------------------

    /// Take up to `amount` of `kind` from the requester's active silo.
    ///
    /// Returns how much is still owed: `amount` when there is no active
    /// silo, zero when the silo covered everything, otherwise the shortfall
    /// the caller has to source from its own ledger.
    pub fn withdraw(
        &self,
        ctx: &mut ModuleContext<'_>,
        requester: EntityId,
        kind: &MaterialKind,
        amount: u32,
    ) -> u32 {
        let Some(silo) = self.resolve_active_silo(requester, &*ctx.ledger, ctx.power) else {
            return amount;
        };
        let held = ctx.ledger.get_amount(silo, kind);
        let taken = held.min(amount);
        if taken > 0 && !ctx.ledger.change_amount(silo, kind, -i64::from(taken)) {
            return amount;
        }
        debug!("{requester:?} withdrew {taken} {kind} from silo {silo:?}");
        amount - taken
    }

    /// Units of `kind` available to `entity`: its own ledger plus its active
    /// silo's.
    pub fn available(&self, ctx: &ModuleContext<'_>, entity: EntityId, kind: &MaterialKind) -> u64 {
        let own = u64::from(ctx.ledger.get_amount(entity, kind));
        let pooled = self
            .resolve_active_silo(entity, &*ctx.ledger, ctx.power)
            .map_or(0, |silo| u64::from(ctx.ledger.get_amount(silo, kind)));
        own + pooled
    }

    /// Spend `amount` of `kind` on behalf of `entity`, silo first.
    ///
    /// All-or-nothing: returns false and changes nothing unless the silo
    /// and the entity's own ledger together hold enough.
    pub fn consume(
        &self,
        ctx: &mut ModuleContext<'_>,
        entity: EntityId,
        kind: &MaterialKind,
        amount: u32,
    ) -> bool {
        if self.available(ctx, entity, kind) < u64::from(amount) {
            return false;
        }
        let owed = self.withdraw(ctx, entity, kind, amount);
        owed == 0 || ctx.ledger.change_amount(entity, kind, -i64::from(owed))
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Re-raise a material change on `silo` on every connected utilizer.
    /// Returns the number of notifications raised.
    pub fn fan_out(&self, silo: EntityId, kind: &MaterialKind, events: &mut EventBus) -> usize {
        let utilizers = self.links.utilizers_of(silo);
        for &utilizer in utilizers {
            trace!("relaying {kind} change on silo {silo:?} to {utilizer:?}");
            events.raise(
                utilizer,
                Event::MaterialAmountChanged {
                    kind: kind.clone(),
                    relayed_from: Some(silo),
                },
            );
        }
        utilizers.len()
    }

    // -----------------------------------------------------------------------
    // Entity removal
    // -----------------------------------------------------------------------

    /// Drop the records of a removed entity.
    pub fn remove_entity(&mut self, entity: EntityId) {
        let orphaned = self.links.remove_entity(entity);
        if !orphaned.is_empty() {
            debug!("silo {entity:?} removed, {} utilizers detached", orphaned.len());
        }
    }
}

/// Move every material `utilizer` holds into `silo`.
fn migrate_materials(utilizer: EntityId, silo: EntityId, ledger: &mut dyn MaterialLedger) {
    for (kind, amount) in ledger.materials(utilizer) {
        if !ledger.transfer(utilizer, silo, &kind, amount) {
            debug!("silo {silo:?} refused {amount} {kind} from {utilizer:?}");
        }
    }
}

impl Module for MaterialSiloSystem {
    fn name(&self) -> &str {
        "material_silo"
    }

    fn on_event(&mut self, target: EntityId, event: &Event, ctx: &mut ModuleContext<'_>) {
        match event {
            Event::NewLink { source, sink } if *sink == target && self.links.is_utilizer(target) => {
                let previous = self.links.silo_of(target);
                match self.link_utilizer(target, *source, &mut *ctx.ledger) {
                    // A utilizer keeps at most one silo device link.
                    Ok(()) => {
                        if let Some(old) = previous.filter(|old| old != source) {
                            ctx.events.request_unlink(old, target);
                        }
                    }
                    Err(rejection) => debug!("link {source:?} -> {target:?} ignored: {rejection}"),
                }
            }
            Event::LinkRemoved { source, sink }
                if *sink == target && self.links.silo_of(target) == Some(*source) =>
            {
                self.unlink_utilizer(target);
            }
            Event::MaterialAmountChanged {
                kind,
                relayed_from: None,
            } if self.config.fan_out_changes && self.links.is_silo(target) => {
                self.fan_out(target, kind, ctx.events);
            }
            Event::EntityRemoved => self.remove_entity(target),
            _ => {}
        }
    }

    fn before_insert(&mut self, target: EntityId, args: &mut BeforeInsert, ctx: &mut ModuleContext<'_>) {
        if self.links.is_utilizer(target) {
            self.intercept_insert(target, args, &mut *ctx.ledger, ctx.power);
        }
    }

    fn serialize_state(&self) -> Vec<u8> {
        self.links.export_state()
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), ModuleError> {
        self.links.import_state(data)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

// ===========================================================================
// Tests
// ===========================================================================
