//! The host world: entities, their records, device links, and the event
//! dispatcher that drives registered modules.
//!
//! # Delivery model
//!
//! Every public mutating operation runs to completion and then *flushes*:
//!
//! 1. Ledger changes made since the last flush become
//!    [`Event::MaterialAmountChanged`] notifications on the changed entity.
//! 2. Non-silent insertions become [`Event::MaterialEntityInserted`].
//! 3. Material entities spent by insertion are removed from the world.
//! 4. Device links modules asked to remove are removed, raising
//!    [`Event::LinkRemoved`] on both ends.
//! 5. The oldest queued event is delivered to passive listeners and then to
//!    every module in registration order.
//!
//! Steps repeat until the queue is empty. Handlers may raise further events;
//! a per-flush delivery cap stops runaway re-raise loops.
//!
//! "Before insert" notifications bypass the queue: they are delivered
//! synchronously so the caller can observe `handled`.

use slotmap::SlotMap;

use crate::event::{BeforeInsert, Event, EventBus};
use crate::id::{EntityId, MaterialKind};
use crate::ledger::{Ledgers, MaterialLedger, MaterialStorage, PhysicalComposition};
use crate::module::{Module, ModuleContext, ModuleError};
use crate::power::{PowerReceiver, PowerReceivers};

/// Default maximum number of events delivered in a single flush.
pub const DEFAULT_DELIVERY_CAP: usize = 10_000;

/// Per-entity bookkeeping held by the world itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    pub name: String,
}

/// A directed device link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub source: EntityId,
    pub sink: EntityId,
}

/// The host world.
#[derive(Debug)]
pub struct World {
    entities: SlotMap<EntityId, EntityMeta>,
    ledgers: Ledgers,
    power: PowerReceivers,
    /// Device links in creation order.
    links: Vec<Link>,
    /// Raised events awaiting delivery.
    pub events: EventBus,
    modules: Vec<Box<dyn Module>>,
    delivery_cap: usize,
    /// Events delivered since creation.
    delivered: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: SlotMap::with_key(),
            ledgers: Ledgers::new(),
            power: PowerReceivers::new(),
            links: Vec::new(),
            events: EventBus::new(),
            modules: Vec::new(),
            delivery_cap: DEFAULT_DELIVERY_CAP,
            delivered: 0,
        }
    }

    /// Set the maximum number of events delivered per flush. Clamped to 1.
    pub fn set_delivery_cap(&mut self, cap: usize) {
        self.delivery_cap = cap.max(1);
    }

    // -----------------------------------------------------------------------
    // Modules
    // -----------------------------------------------------------------------

    /// Register a module. Modules receive notifications in registration order.
    pub fn register_module(&mut self, module: Box<dyn Module>) {
        self.modules.push(module);
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Find the first registered module of concrete type `T`.
    pub fn find_module<T: 'static>(&self) -> Option<&T> {
        self.modules.iter().find_map(|m| m.as_any().downcast_ref::<T>())
    }

    /// Find the first registered module of concrete type `T`, mutably.
    pub fn find_module_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.modules
            .iter_mut()
            .find_map(|m| m.as_any_mut().downcast_mut::<T>())
    }

    /// Serialized state of the module named `name`.
    pub fn module_state(&self, name: &str) -> Result<Vec<u8>, ModuleError> {
        self.modules
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.serialize_state())
            .ok_or_else(|| ModuleError::NotFound(name.to_owned()))
    }

    /// Load serialized state into the module named `name`.
    pub fn load_module_state(&mut self, name: &str, data: &[u8]) -> Result<(), ModuleError> {
        let module = self
            .modules
            .iter_mut()
            .find(|m| m.name() == name)
            .ok_or_else(|| ModuleError::NotFound(name.to_owned()))?;
        module.load_state(data)
    }

    /// Run `f` against the first registered module of type `T`, with a
    /// module context. Returns `None` if no such module is registered.
    /// Events raised by `f` are flushed afterwards.
    pub fn with_module<T: 'static, R>(
        &mut self,
        f: impl FnOnce(&mut T, &mut ModuleContext<'_>) -> R,
    ) -> Option<R> {
        let mut modules = std::mem::take(&mut self.modules);
        let result = modules
            .iter_mut()
            .find_map(|m| m.as_any_mut().downcast_mut::<T>())
            .map(|module| {
                let mut ctx = ModuleContext {
                    ledger: &mut self.ledgers,
                    power: &self.power,
                    events: &mut self.events,
                };
                f(module, &mut ctx)
            });
        self.modules = modules;
        self.flush();
        result
    }

    /// Run `f` with a module context, outside of event delivery. Any events
    /// raised or ledger changes made are flushed afterwards.
    pub fn with_context<R>(&mut self, f: impl FnOnce(&mut ModuleContext<'_>) -> R) -> R {
        let result = {
            let mut ctx = ModuleContext {
                ledger: &mut self.ledgers,
                power: &self.power,
                events: &mut self.events,
            };
            f(&mut ctx)
        };
        self.flush();
        result
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Spawn a bare entity.
    pub fn spawn(&mut self, name: impl Into<String>) -> EntityId {
        self.entities.insert(EntityMeta { name: name.into() })
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn name(&self, entity: EntityId) -> Option<&str> {
        self.entities.get(entity).map(|m| m.name.as_str())
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Remove an entity. Its links are removed first (with notifications),
    /// then [`Event::EntityRemoved`] is delivered while its records still
    /// exist, then the records are dropped.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if !self.contains(entity) {
            return false;
        }
        let attached: Vec<Link> = self
            .links
            .iter()
            .copied()
            .filter(|l| l.source == entity || l.sink == entity)
            .collect();
        for link in attached {
            self.remove_link(link);
        }
        self.events.raise(entity, Event::EntityRemoved);
        self.flush();
        self.drop_records(entity);
        true
    }

    fn drop_records(&mut self, entity: EntityId) {
        self.ledgers.remove_entity(entity);
        self.power.remove(entity);
        self.entities.remove(entity);
    }

    // -----------------------------------------------------------------------
    // Materials
    // -----------------------------------------------------------------------

    /// Give `entity` a material storage, replacing any existing one.
    pub fn add_material_storage(&mut self, entity: EntityId, storage: MaterialStorage) {
        if self.contains(entity) {
            self.ledgers.set_storage(entity, storage);
        }
    }

    pub fn ledger(&self) -> &Ledgers {
        &self.ledgers
    }

    /// Convenience for `ledger().get_amount(..)`.
    pub fn material_amount(&self, entity: EntityId, kind: &MaterialKind) -> u32 {
        self.ledgers.get_amount(entity, kind)
    }

    /// Apply a signed change to an entity's ledger and deliver the resulting
    /// notifications.
    pub fn change_material_amount(&mut self, entity: EntityId, kind: &MaterialKind, delta: i64) -> bool {
        let changed = self.ledgers.change_amount(entity, kind, delta);
        self.flush();
        changed
    }

    /// Spawn a material entity (sheet stack, ingots) with the given composition.
    pub fn spawn_material(&mut self, name: impl Into<String>, composition: PhysicalComposition) -> EntityId {
        let entity = self.spawn(name);
        self.ledgers.set_composition(entity, composition);
        entity
    }

    /// Insert a material entity into `target`.
    ///
    /// Modules first see a [`BeforeInsert`] on `target`; if one of them marks
    /// it handled, the default insertion is skipped and this returns true.
    /// Otherwise the full composition is inserted into `target`'s own ledger.
    pub fn try_insert_material_entity(
        &mut self,
        user: Option<EntityId>,
        item: EntityId,
        target: EntityId,
    ) -> bool {
        if !self.contains(item) || !self.contains(target) {
            return false;
        }

        let mut args = BeforeInsert::new(user, item);
        let mut modules = std::mem::take(&mut self.modules);
        for module in &mut modules {
            let mut ctx = ModuleContext {
                ledger: &mut self.ledgers,
                power: &self.power,
                events: &mut self.events,
            };
            module.before_insert(target, &mut args, &mut ctx);
            if args.handled {
                break;
            }
        }
        self.modules = modules;

        let inserted = args.handled || self.ledgers.insert_material_entity(user, item, target, false);
        self.flush();
        inserted
    }

    // -----------------------------------------------------------------------
    // Power
    // -----------------------------------------------------------------------

    pub fn add_power_receiver(&mut self, entity: EntityId, receiver: PowerReceiver) {
        if self.contains(entity) {
            self.power.insert(entity, receiver);
        }
    }

    pub fn power(&self) -> &PowerReceivers {
        &self.power
    }

    /// Switch an entity's power. Raises [`Event::PowerChanged`] on transitions.
    pub fn set_powered(&mut self, entity: EntityId, powered: bool) {
        if self.power.set_powered(entity, powered) {
            self.events.raise(entity, Event::PowerChanged { powered });
        }
        self.flush();
    }

    // -----------------------------------------------------------------------
    // Device links
    // -----------------------------------------------------------------------

    /// Create a device link. Raises [`Event::NewLink`] on both endpoints.
    /// Returns false if either entity is missing or the link already exists.
    pub fn link(&mut self, source: EntityId, sink: EntityId) -> bool {
        if !self.contains(source) || !self.contains(sink) {
            return false;
        }
        let link = Link { source, sink };
        if self.links.contains(&link) {
            return false;
        }
        self.links.push(link);
        self.events.raise(sink, Event::NewLink { source, sink });
        if source != sink {
            self.events.raise(source, Event::NewLink { source, sink });
        }
        self.flush();
        true
    }

    /// Remove a device link. Raises [`Event::LinkRemoved`] on both endpoints.
    pub fn unlink(&mut self, source: EntityId, sink: EntityId) -> bool {
        let removed = self.remove_link(Link { source, sink });
        self.flush();
        removed
    }

    fn remove_link(&mut self, link: Link) -> bool {
        let before = self.links.len();
        self.links.retain(|l| *l != link);
        if self.links.len() == before {
            return false;
        }
        let Link { source, sink } = link;
        self.events.raise(sink, Event::LinkRemoved { source, sink });
        if source != sink {
            self.events.raise(source, Event::LinkRemoved { source, sink });
        }
        true
    }

    /// Every link with `entity` at either end.
    pub fn links_of(&self, entity: EntityId) -> Vec<Link> {
        self.links
            .iter()
            .copied()
            .filter(|l| l.source == entity || l.sink == entity)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Raise an arbitrary event on `target` and deliver it.
    pub fn raise(&mut self, target: EntityId, event: Event) {
        self.events.raise(target, event);
        self.flush();
    }

    /// Events delivered since creation.
    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    /// Deliver queued notifications until the queue drains or the delivery
    /// cap is reached.
    pub fn flush(&mut self) {
        let mut delivered = 0usize;
        loop {
            self.collect_pending();
            let Some((target, event)) = self.events.pop() else {
                break;
            };
            if !self.contains(target) {
                continue;
            }
            if delivered == self.delivery_cap {
                log::warn!(
                    "delivery cap of {} reached, dropping {} queued events",
                    self.delivery_cap,
                    self.events.pending() + 1
                );
                self.events.clear();
                break;
            }
            self.deliver(target, &event);
            delivered += 1;
        }
    }

    fn collect_pending(&mut self) {
        for (entity, kind) in self.ledgers.take_changes() {
            self.events.raise(
                entity,
                Event::MaterialAmountChanged {
                    kind,
                    relayed_from: None,
                },
            );
        }
        for insertion in self.ledgers.take_insertions() {
            self.events.raise(
                insertion.target,
                Event::MaterialEntityInserted {
                    user: insertion.user,
                    item: insertion.item,
                },
            );
        }
        for item in self.ledgers.take_spent() {
            self.drop_records(item);
        }
        for (source, sink) in self.events.take_unlink_requests() {
            self.remove_link(Link { source, sink });
        }
    }

    fn deliver(&mut self, target: EntityId, event: &Event) {
        self.events.notify_listeners(target, event);
        let mut modules = std::mem::take(&mut self.modules);
        for module in &mut modules {
            let mut ctx = ModuleContext {
                ledger: &mut self.ledgers,
                power: &self.power,
                events: &mut self.events,
            };
            module.on_event(target, event, &mut ctx);
        }
        self.modules = modules;
        self.delivered += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::test_utils::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(world: &mut World, kind: EventKind) -> Rc<RefCell<Vec<(EntityId, Event)>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        world.events.on_passive(
            kind,
            Box::new(move |target, event| sink.borrow_mut().push((target, event.clone()))),
        );
        seen
    }

    #[test]
    fn spawn_and_despawn() {
        let mut world = World::new();
        let lathe = spawn_lathe(&mut world);
        assert!(world.contains(lathe));
        assert_eq!(world.name(lathe), Some("lathe"));
        assert!(world.ledger().has_storage(lathe));

        assert!(world.despawn(lathe));
        assert!(!world.contains(lathe));
        assert!(!world.ledger().has_storage(lathe));
        assert!(!world.despawn(lathe));
    }

    #[test]
    fn ledger_change_raises_amount_changed() {
        let mut world = World::new();
        let lathe = spawn_lathe(&mut world);
        let seen = record(&mut world, EventKind::MaterialAmountChanged);

        assert!(world.change_material_amount(lathe, &steel(), 5));

        assert_eq!(
            *seen.borrow(),
            vec![(
                lathe,
                Event::MaterialAmountChanged {
                    kind: steel(),
                    relayed_from: None
                }
            )]
        );
    }

    #[test]
    fn link_raises_on_both_endpoints() {
        let mut world = World::new();
        let a = spawn_lathe(&mut world);
        let b = spawn_lathe(&mut world);
        let seen = record(&mut world, EventKind::NewLink);

        assert!(world.link(a, b));
        assert!(!world.link(a, b), "duplicate link refused");

        let targets: Vec<EntityId> = seen.borrow().iter().map(|(t, _)| *t).collect();
        assert_eq!(targets, vec![b, a]);
        assert_eq!(world.links_of(a), vec![Link { source: a, sink: b }]);
    }

    #[test]
    fn self_link_raises_once() {
        let mut world = World::new();
        let a = spawn_lathe(&mut world);
        let seen = record(&mut world, EventKind::NewLink);

        assert!(world.link(a, a));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn unlink_removes_and_notifies() {
        let mut world = World::new();
        let a = spawn_lathe(&mut world);
        let b = spawn_lathe(&mut world);
        world.link(a, b);
        let seen = record(&mut world, EventKind::LinkRemoved);

        assert!(world.unlink(a, b));
        assert!(!world.unlink(a, b));
        assert_eq!(seen.borrow().len(), 2);
        assert!(world.links_of(a).is_empty());
    }

    #[test]
    fn requested_unlink_applies_on_flush() {
        let mut world = World::new();
        let a = spawn_lathe(&mut world);
        let b = spawn_lathe(&mut world);
        let c = spawn_lathe(&mut world);
        world.link(a, c);
        world.link(b, c);
        let seen = record(&mut world, EventKind::LinkRemoved);

        world.with_context(|ctx| ctx.events.request_unlink(a, c));

        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(world.links_of(c), vec![Link { source: b, sink: c }]);
        assert!(world.link(a, c));
    }

    #[test]
    fn despawn_removes_links_first() {
        let mut world = World::new();
        let a = spawn_lathe(&mut world);
        let b = spawn_lathe(&mut world);
        world.link(a, b);
        let removed = record(&mut world, EventKind::LinkRemoved);
        let gone = record(&mut world, EventKind::EntityRemoved);

        world.despawn(a);

        assert_eq!(removed.borrow().len(), 2);
        assert_eq!(*gone.borrow(), vec![(a, Event::EntityRemoved)]);
        assert!(world.links_of(b).is_empty());
    }

    #[test]
    fn default_insert_lands_in_target() {
        let mut world = World::new();
        let lathe = spawn_lathe(&mut world);
        let sheets = spawn_sheets(&mut world, glass(), 3);
        let seen = record(&mut world, EventKind::MaterialEntityInserted);

        assert!(world.try_insert_material_entity(None, sheets, lathe));
        assert_eq!(amount(&world, lathe, &glass()), 3 * SHEET_UNITS);
        assert!(!world.contains(sheets), "spent material entity is removed");
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn insert_into_missing_target_fails() {
        let mut world = World::new();
        let lathe = spawn_lathe(&mut world);
        let sheets = spawn_sheets(&mut world, glass(), 3);
        world.despawn(lathe);

        assert!(!world.try_insert_material_entity(None, sheets, lathe));
        assert!(world.contains(sheets));
    }

    #[test]
    fn power_change_raised_on_transition_only() {
        let mut world = World::new();
        let lathe = spawn_lathe(&mut world);
        let seen = record(&mut world, EventKind::PowerChanged);

        world.set_powered(lathe, true);
        world.set_powered(lathe, false);
        world.set_powered(lathe, false);

        assert_eq!(
            *seen.borrow(),
            vec![(lathe, Event::PowerChanged { powered: false })]
        );
    }

    #[test]
    fn events_on_removed_entities_are_dropped() {
        let mut world = World::new();
        let a = spawn_lathe(&mut world);
        world.despawn(a);
        let before = world.delivered_count();

        world.raise(a, Event::PowerChanged { powered: true });
        assert_eq!(world.delivered_count(), before);
    }

    #[test]
    fn runaway_loop_hits_delivery_cap() {
        #[derive(Debug)]
        struct Echo;

        impl Module for Echo {
            fn name(&self) -> &str {
                "echo"
            }

            fn on_event(&mut self, target: EntityId, event: &Event, ctx: &mut ModuleContext<'_>) {
                ctx.events.raise(target, event.clone());
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }

        let mut world = World::new();
        world.set_delivery_cap(50);
        world.register_module(Box::new(Echo));
        let a = spawn_lathe(&mut world);

        world.raise(a, Event::PowerChanged { powered: true });

        assert_eq!(world.delivered_count(), 50);
        assert_eq!(world.events.pending(), 0);
    }

    #[test]
    fn unknown_module_state_is_not_found() {
        let mut world = World::new();
        assert!(matches!(
            world.module_state("silo"),
            Err(ModuleError::NotFound(_))
        ));
        assert!(matches!(
            world.load_module_state("silo", &[]),
            Err(ModuleError::NotFound(_))
        ));
    }
}
