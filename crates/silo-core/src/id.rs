use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Identifies an entity (machine, silo, material stack) in the world.
    pub struct EntityId;
}

/// Identifies a kind of raw material ("steel", "glass", ...).
///
/// Ordered so that ledgers iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MaterialKind(pub String);

impl MaterialKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MaterialKind {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for MaterialKind {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
