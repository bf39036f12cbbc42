//! Material Silo Module for the silo host world.
//!
//! A material silo pools raw materials for every machine (lathe,
//! fabricator) linked to it. Linked machines, called *utilizers*, hand their
//! existing stock to the silo when the link is made, have material
//! insertions redirected into the silo while it is powered, and draw from
//! the silo first when they spend materials.
//!
//! # Design
//!
//! - The silo ↔ utilizer relation lives in one place, [`relation::SiloLinks`];
//!   both sides only change together.
//! - Every silo interaction is gated on the *silo's* power, never the
//!   requester's.
//! - Link-time migration moves each material as a single atomic transfer.
//! - Handlers never fail outward: refusals are logged and ignored.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut world = World::new();
//! world.register_module(Box::new(MaterialSiloSystem::new()));
//! world.make_silo(silo);
//! world.make_utilizer(lathe);
//! world.link(silo, lathe); // lathe's materials move into the silo
//! ```

pub mod components;
pub mod config;
pub mod ext;
pub mod relation;
pub mod system;

pub use components::{MaterialSilo, MaterialSiloUtilizer};
pub use config::{ConfigError, SiloConfig};
pub use ext::SiloWorldExt;
pub use relation::{LinkRejection, SiloLinks};
pub use system::MaterialSiloSystem;
