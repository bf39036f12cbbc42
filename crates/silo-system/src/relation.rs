//! The silo ↔ utilizer relation.
//!
//! [`SiloLinks`] is the single owner of both sides of the relation: the
//! silo's utilizer set and each utilizer's silo reference. The two sides
//! are only ever changed together, through the methods below, so they
//! cannot drift apart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use silo_core::id::EntityId;
use silo_core::module::ModuleError;

use crate::components::{MaterialSilo, MaterialSiloUtilizer};

/// Why a link request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkRejection {
    /// Utilizer and silo are the same entity.
    #[error("entity {0:?} cannot be linked to itself")]
    SelfLink(EntityId),
    /// The source of the link carries no silo record.
    #[error("{0:?} is not a material silo")]
    NotASilo(EntityId),
    /// The sink of the link carries no utilizer record.
    #[error("{0:?} is not a silo utilizer")]
    NotAUtilizer(EntityId),
    /// One side of the link has no material ledger.
    #[error("{0:?} has no material storage")]
    MissingStorage(EntityId),
}

/// Silo and utilizer records for every entity that has one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiloLinks {
    silos: BTreeMap<EntityId, MaterialSilo>,
    utilizers: BTreeMap<EntityId, MaterialSiloUtilizer>,
}

impl SiloLinks {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Give `entity` a silo record. Returns false if it already had one.
    pub fn add_silo(&mut self, entity: EntityId) -> bool {
        if self.silos.contains_key(&entity) {
            return false;
        }
        self.silos.insert(entity, MaterialSilo::default());
        true
    }

    /// Give `entity` a utilizer record. Returns false if it already had one.
    pub fn add_utilizer(&mut self, entity: EntityId) -> bool {
        if self.utilizers.contains_key(&entity) {
            return false;
        }
        self.utilizers.insert(entity, MaterialSiloUtilizer::default());
        true
    }

    pub fn is_silo(&self, entity: EntityId) -> bool {
        self.silos.contains_key(&entity)
    }

    pub fn is_utilizer(&self, entity: EntityId) -> bool {
        self.utilizers.contains_key(&entity)
    }

    pub fn silo(&self, entity: EntityId) -> Option<&MaterialSilo> {
        self.silos.get(&entity)
    }

    pub fn utilizer(&self, entity: EntityId) -> Option<&MaterialSiloUtilizer> {
        self.utilizers.get(&entity)
    }

    /// The silo `utilizer` is connected to.
    pub fn silo_of(&self, utilizer: EntityId) -> Option<EntityId> {
        self.utilizers.get(&utilizer).and_then(|u| u.silo)
    }

    /// Utilizers connected to `silo`, in connection order.
    pub fn utilizers_of(&self, silo: EntityId) -> &[EntityId] {
        self.silos
            .get(&silo)
            .map(|s| s.utilizers.as_slice())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Connect `utilizer` to `silo`.
    ///
    /// Idempotent for an existing connection. A utilizer connected to a
    /// different silo is detached from it first; that silo is returned.
    pub fn connect(
        &mut self,
        utilizer: EntityId,
        silo: EntityId,
    ) -> Result<Option<EntityId>, LinkRejection> {
        if utilizer == silo {
            return Err(LinkRejection::SelfLink(utilizer));
        }
        if !self.is_silo(silo) {
            return Err(LinkRejection::NotASilo(silo));
        }
        if !self.is_utilizer(utilizer) {
            return Err(LinkRejection::NotAUtilizer(utilizer));
        }

        let previous = match self.silo_of(utilizer) {
            Some(current) if current == silo => None,
            Some(_) => self.disconnect(utilizer),
            None => None,
        };

        if let Some(record) = self.silos.get_mut(&silo) {
            record.insert(utilizer);
        }
        if let Some(record) = self.utilizers.get_mut(&utilizer) {
            record.silo = Some(silo);
        }
        Ok(previous)
    }

    /// Detach `utilizer` from its silo. Returns the silo it was attached to,
    /// or `None` if it was not attached (a repeated call is a no-op).
    pub fn disconnect(&mut self, utilizer: EntityId) -> Option<EntityId> {
        let silo = self.utilizers.get_mut(&utilizer)?.silo.take()?;
        if let Some(record) = self.silos.get_mut(&silo) {
            record.remove(utilizer);
        }
        Some(silo)
    }

    /// Drop every record held for `entity`, detaching whatever it was
    /// connected to. Returns the utilizers that lost their silo.
    pub fn remove_entity(&mut self, entity: EntityId) -> Vec<EntityId> {
        self.disconnect(entity);
        self.utilizers.remove(&entity);

        let Some(silo) = self.silos.remove(&entity) else {
            return Vec::new();
        };
        for utilizer in &silo.utilizers {
            if let Some(record) = self.utilizers.get_mut(utilizer) {
                if record.silo == Some(entity) {
                    record.silo = None;
                }
            }
        }
        silo.utilizers
    }

    // -----------------------------------------------------------------------
    // Consistency & replication
    // -----------------------------------------------------------------------

    /// Check that both sides of the relation mirror each other.
    pub fn validate(&self) -> Result<(), ModuleError> {
        for (&utilizer, record) in &self.utilizers {
            if let Some(silo) = record.silo {
                if !self.silos.get(&silo).is_some_and(|s| s.contains(utilizer)) {
                    return Err(ModuleError::InconsistentState(format!(
                        "utilizer {utilizer:?} points at {silo:?}, which does not list it"
                    )));
                }
            }
        }
        for (&silo, record) in &self.silos {
            for (i, &utilizer) in record.utilizers.iter().enumerate() {
                if record.utilizers[..i].contains(&utilizer) {
                    return Err(ModuleError::InconsistentState(format!(
                        "silo {silo:?} lists {utilizer:?} twice"
                    )));
                }
                if self.silo_of(utilizer) != Some(silo) {
                    return Err(ModuleError::InconsistentState(format!(
                        "silo {silo:?} lists {utilizer:?}, which is not connected to it"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Encode the relation for replication.
    pub fn export_state(&self) -> Vec<u8> {
        bitcode::serialize(self).unwrap_or_default()
    }

    /// Replace the relation with previously exported state. The state is
    /// validated first; on error the current relation is kept.
    pub fn import_state(&mut self, data: &[u8]) -> Result<(), ModuleError> {
        let links: SiloLinks =
            bitcode::deserialize(data).map_err(|e| ModuleError::DeserializeFailed(e.to_string()))?;
        links.validate()?;
        *self = links;
        Ok(())
    }
}
