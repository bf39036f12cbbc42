use serde::{Deserialize, Serialize};
use silo_core::id::EntityId;

/// Silo record: the utilizers currently sharing this silo's ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialSilo {
    /// Connected utilizers in connection order. Never contains duplicates.
    pub utilizers: Vec<EntityId>,
}

impl MaterialSilo {
    pub fn contains(&self, utilizer: EntityId) -> bool {
        self.utilizers.contains(&utilizer)
    }

    /// Add a utilizer. Returns false if it was already present.
    pub(crate) fn insert(&mut self, utilizer: EntityId) -> bool {
        if self.contains(utilizer) {
            return false;
        }
        self.utilizers.push(utilizer);
        true
    }

    /// Remove a utilizer. Returns false if it was not present.
    pub(crate) fn remove(&mut self, utilizer: EntityId) -> bool {
        let before = self.utilizers.len();
        self.utilizers.retain(|u| *u != utilizer);
        self.utilizers.len() != before
    }
}

/// Utilizer record: the silo this machine draws materials from, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialSiloUtilizer {
    pub silo: Option<EntityId>,
}
