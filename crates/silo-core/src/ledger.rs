//! Per-entity material ledgers.
//!
//! A [`MaterialStorage`] maps material kinds to integer quantities for one
//! entity. [`Ledgers`] owns the storages of every entity in the world and
//! implements the [`MaterialLedger`] interface that gameplay modules use.
//!
//! Every successful change is recorded so the world can raise a
//! "material amount changed" notification on the affected entity once the
//! current handler returns.

use crate::id::{EntityId, MaterialKind};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// MaterialStorage
// ---------------------------------------------------------------------------

/// Material quantities held by a single entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialStorage {
    /// Quantity per material kind. Kinds at zero are removed.
    pub storage: BTreeMap<MaterialKind, u32>,
    /// Maximum total units across all kinds. `None` means unlimited.
    #[serde(default)]
    pub storage_limit: Option<u32>,
    /// Kinds this storage accepts. `None` accepts everything.
    #[serde(default)]
    pub whitelist: Option<BTreeSet<MaterialKind>>,
}

impl MaterialStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: u32) -> Self {
        Self {
            storage_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn with_whitelist<I, K>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<MaterialKind>,
    {
        self.whitelist = Some(kinds.into_iter().map(Into::into).collect());
        self
    }

    /// Quantity held of a specific kind.
    pub fn amount(&self, kind: &MaterialKind) -> u32 {
        self.storage.get(kind).copied().unwrap_or(0)
    }

    /// Total units across all kinds.
    pub fn total(&self) -> u64 {
        self.storage.values().map(|&v| u64::from(v)).sum()
    }

    pub fn is_whitelisted(&self, kind: &MaterialKind) -> bool {
        self.whitelist.as_ref().is_none_or(|w| w.contains(kind))
    }

    /// Whether applying `delta` to `kind` would be accepted.
    pub fn can_change(&self, kind: &MaterialKind, delta: i64) -> bool {
        let Some(next) = i64::from(self.amount(kind)).checked_add(delta) else {
            return false;
        };
        if next < 0 || next > i64::from(u32::MAX) {
            return false;
        }
        if delta > 0 {
            if !self.is_whitelisted(kind) {
                return false;
            }
            if let Some(limit) = self.storage_limit {
                if self.total() + delta as u64 > u64::from(limit) {
                    return false;
                }
            }
        }
        true
    }

    /// Apply `delta` to `kind`. Returns false (and changes nothing) if the
    /// change is refused.
    pub fn change(&mut self, kind: &MaterialKind, delta: i64) -> bool {
        if !self.can_change(kind, delta) {
            return false;
        }
        let next = (i64::from(self.amount(kind)) + delta) as u32;
        if next == 0 {
            self.storage.remove(kind);
        } else {
            self.storage.insert(kind.clone(), next);
        }
        true
    }

    /// Whether every quantity in `incoming` can be added at once.
    pub fn can_accept(&self, incoming: &BTreeMap<MaterialKind, u32>) -> bool {
        let added: u64 = incoming.values().map(|&v| u64::from(v)).sum();
        if let Some(limit) = self.storage_limit {
            if self.total() + added > u64::from(limit) {
                return false;
            }
        }
        incoming
            .iter()
            .all(|(kind, &qty)| qty == 0 || self.can_change(kind, i64::from(qty)))
    }
}

// ---------------------------------------------------------------------------
// PhysicalComposition
// ---------------------------------------------------------------------------

/// What a material entity (sheet stack, ingot pile) is made of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalComposition {
    /// Units of each material per single item in the stack.
    pub per_unit: BTreeMap<MaterialKind, u32>,
    /// Number of items in the stack.
    pub count: u32,
}

impl PhysicalComposition {
    pub fn new(count: u32) -> Self {
        Self {
            per_unit: BTreeMap::new(),
            count,
        }
    }

    pub fn with_material(mut self, kind: impl Into<MaterialKind>, per_unit: u32) -> Self {
        self.per_unit.insert(kind.into(), per_unit);
        self
    }

    /// Total units of each material in the whole stack. `None` on overflow.
    pub fn totals(&self) -> Option<BTreeMap<MaterialKind, u32>> {
        self.per_unit
            .iter()
            .map(|(kind, &per)| per.checked_mul(self.count).map(|qty| (kind.clone(), qty)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// MaterialLedger interface
// ---------------------------------------------------------------------------

/// Ledger operations available to gameplay modules.
pub trait MaterialLedger {
    /// Whether the entity has a material storage at all.
    fn has_storage(&self, entity: EntityId) -> bool;

    /// Quantity of `kind` held by `entity`. Zero if it has no storage.
    fn get_amount(&self, entity: EntityId, kind: &MaterialKind) -> u32;

    /// Snapshot of every kind the entity holds, in kind order.
    fn materials(&self, entity: EntityId) -> Vec<(MaterialKind, u32)>;

    fn can_change_amount(&self, entity: EntityId, kind: &MaterialKind, delta: i64) -> bool;

    /// Apply a signed change. Returns false and changes nothing if refused.
    fn change_amount(&mut self, entity: EntityId, kind: &MaterialKind, delta: i64) -> bool;

    /// Insert a material entity's full composition into `target`.
    ///
    /// All-or-nothing: either every material fits and the material entity is
    /// spent, or nothing changes. `silent` suppresses the insertion
    /// notification.
    fn insert_material_entity(
        &mut self,
        user: Option<EntityId>,
        item: EntityId,
        target: EntityId,
        silent: bool,
    ) -> bool;

    /// Move `amount` of `kind` from `from` to `to` as one operation.
    ///
    /// Both sides are checked before either is changed, so a refused
    /// transfer leaves both ledgers untouched.
    fn transfer(&mut self, from: EntityId, to: EntityId, kind: &MaterialKind, amount: u32) -> bool {
        if from == to || amount == 0 {
            return false;
        }
        let delta = i64::from(amount);
        if !self.can_change_amount(to, kind, delta) || !self.can_change_amount(from, kind, -delta) {
            return false;
        }
        self.change_amount(to, kind, delta) && self.change_amount(from, kind, -delta)
    }
}

// ---------------------------------------------------------------------------
// Ledgers
// ---------------------------------------------------------------------------

/// Record of a non-silent material entity insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    pub user: Option<EntityId>,
    pub item: EntityId,
    pub target: EntityId,
}

/// All material storages and compositions in the world.
#[derive(Debug, Default)]
pub struct Ledgers {
    storages: SecondaryMap<EntityId, MaterialStorage>,
    compositions: SecondaryMap<EntityId, PhysicalComposition>,
    /// (entity, kind) pairs changed since the last drain.
    changes: Vec<(EntityId, MaterialKind)>,
    /// Material entities consumed by insertion since the last drain.
    spent: Vec<EntityId>,
    /// Non-silent insertions since the last drain.
    insertions: Vec<Insertion>,
}

impl Ledgers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_storage(&mut self, entity: EntityId, storage: MaterialStorage) {
        self.storages.insert(entity, storage);
    }

    pub fn storage(&self, entity: EntityId) -> Option<&MaterialStorage> {
        self.storages.get(entity)
    }

    pub fn set_composition(&mut self, entity: EntityId, composition: PhysicalComposition) {
        self.compositions.insert(entity, composition);
    }

    pub fn composition(&self, entity: EntityId) -> Option<&PhysicalComposition> {
        self.compositions.get(entity)
    }

    /// Drop every record held for `entity`.
    pub fn remove_entity(&mut self, entity: EntityId) {
        self.storages.remove(entity);
        self.compositions.remove(entity);
    }

    pub fn take_changes(&mut self) -> Vec<(EntityId, MaterialKind)> {
        std::mem::take(&mut self.changes)
    }

    pub fn take_spent(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.spent)
    }

    pub fn take_insertions(&mut self) -> Vec<Insertion> {
        std::mem::take(&mut self.insertions)
    }
}

impl MaterialLedger for Ledgers {
    fn has_storage(&self, entity: EntityId) -> bool {
        self.storages.contains_key(entity)
    }

    fn get_amount(&self, entity: EntityId, kind: &MaterialKind) -> u32 {
        self.storages.get(entity).map_or(0, |s| s.amount(kind))
    }

    fn materials(&self, entity: EntityId) -> Vec<(MaterialKind, u32)> {
        self.storages
            .get(entity)
            .map(|s| s.storage.iter().map(|(k, &v)| (k.clone(), v)).collect())
            .unwrap_or_default()
    }

    fn can_change_amount(&self, entity: EntityId, kind: &MaterialKind, delta: i64) -> bool {
        self.storages
            .get(entity)
            .is_some_and(|s| s.can_change(kind, delta))
    }

    fn change_amount(&mut self, entity: EntityId, kind: &MaterialKind, delta: i64) -> bool {
        let Some(storage) = self.storages.get_mut(entity) else {
            return false;
        };
        if !storage.change(kind, delta) {
            return false;
        }
        if delta != 0 {
            self.changes.push((entity, kind.clone()));
        }
        true
    }

    fn insert_material_entity(
        &mut self,
        user: Option<EntityId>,
        item: EntityId,
        target: EntityId,
        silent: bool,
    ) -> bool {
        if item == target {
            return false;
        }
        let Some(totals) = self.compositions.get(item).and_then(PhysicalComposition::totals) else {
            return false;
        };
        if totals.values().all(|&qty| qty == 0) {
            return false;
        }
        let Some(storage) = self.storages.get_mut(target) else {
            return false;
        };
        if !storage.can_accept(&totals) {
            return false;
        }
        for (kind, qty) in totals {
            if qty > 0 && storage.change(&kind, i64::from(qty)) {
                self.changes.push((target, kind));
            }
        }
        self.compositions.remove(item);
        self.spent.push(item);
        if !silent {
            self.insertions.push(Insertion { user, item, target });
        }
        true
    }
}
