//! Property-based tests for the silo system.
//!
//! Generates random ledgers, silo limits and operation sequences, then checks
//! that material is conserved and the relation stays consistent.

use proptest::prelude::*;
use silo_core::id::{EntityId, MaterialKind};
use silo_core::ledger::{MaterialLedger, MaterialStorage};
use silo_core::test_utils::*;
use silo_core::world::World;
use silo_system::{MaterialSiloSystem, SiloWorldExt};

// ===========================================================================
// Generators
// ===========================================================================

fn kinds() -> [MaterialKind; 3] {
    [steel(), glass(), gold()]
}

/// Operations applied to a world with two silos and three utilizers.
#[derive(Debug, Clone)]
enum SiloOp {
    Link { silo: usize, utilizer: usize },
    Unlink { silo: usize, utilizer: usize },
    SetPower { silo: usize, powered: bool },
    Withdraw { utilizer: usize, kind: usize, amount: u32 },
    Give { utilizer: usize, kind: usize, amount: u32 },
}

fn arb_op() -> impl Strategy<Value = SiloOp> {
    prop_oneof![
        (0..2usize, 0..3usize).prop_map(|(silo, utilizer)| SiloOp::Link { silo, utilizer }),
        (0..2usize, 0..3usize).prop_map(|(silo, utilizer)| SiloOp::Unlink { silo, utilizer }),
        (0..2usize, any::<bool>()).prop_map(|(silo, powered)| SiloOp::SetPower { silo, powered }),
        (0..3usize, 0..3usize, 0..100u32)
            .prop_map(|(utilizer, kind, amount)| SiloOp::Withdraw { utilizer, kind, amount }),
        (0..3usize, 0..3usize, 0..100u32)
            .prop_map(|(utilizer, kind, amount)| SiloOp::Give { utilizer, kind, amount }),
    ]
}

struct Setup {
    world: World,
    silos: Vec<EntityId>,
    utilizers: Vec<EntityId>,
}

impl Setup {
    fn new(limit: Option<u32>) -> Self {
        let mut world = World::new();
        world.register_module(Box::new(MaterialSiloSystem::new()));
        let storage = limit.map_or_else(MaterialStorage::new, MaterialStorage::with_limit);
        let silos: Vec<EntityId> = (0..2)
            .map(|_| {
                let silo = spawn_machine_with(&mut world, "silo", storage.clone());
                world.make_silo(silo);
                silo
            })
            .collect();
        let utilizers: Vec<EntityId> = (0..3)
            .map(|_| {
                let lathe = spawn_lathe(&mut world);
                world.make_utilizer(lathe);
                lathe
            })
            .collect();
        Self {
            world,
            silos,
            utilizers,
        }
    }

    fn everyone(&self) -> Vec<EntityId> {
        self.silos.iter().chain(&self.utilizers).copied().collect()
    }

    fn total(&self, kind: &MaterialKind) -> u64 {
        total_of(&self.world, &self.everyone(), kind)
    }

    fn relation_consistent(&self) -> bool {
        let linked_both_ways = self.utilizers.iter().all(|&u| match self.world.silo_of(u) {
            Some(s) => self.world.utilizers_of(s).contains(&u),
            None => self.silos.iter().all(|&s| !self.world.utilizers_of(s).contains(&u)),
        });
        let members_point_back = self.silos.iter().all(|&s| {
            self.world
                .utilizers_of(s)
                .iter()
                .all(|&u| self.world.silo_of(u) == Some(s))
        });
        linked_both_ways && members_point_back
    }
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #[test]
    fn linking_conserves_material(
        limit in proptest::option::of(0..400u32),
        stock in proptest::collection::vec(0..200u32, 3),
    ) {
        let mut s = Setup::new(limit);
        let (silo, lathe) = (s.silos[0], s.utilizers[0]);
        for (kind, &qty) in kinds().iter().zip(&stock) {
            give(&mut s.world, lathe, kind, qty);
        }

        s.world.link(silo, lathe);

        for (kind, &qty) in kinds().iter().zip(&stock) {
            let moved = amount(&s.world, silo, kind);
            prop_assert!(moved == 0 || moved == qty, "a material moves whole or not at all");
            prop_assert_eq!(moved + amount(&s.world, lathe, kind), qty);
        }
        if limit.is_none() {
            prop_assert!(s.world.ledger().materials(lathe).is_empty());
        }
    }

    #[test]
    fn random_operations_keep_invariants(
        ops in proptest::collection::vec(arb_op(), 1..80),
    ) {
        let mut s = Setup::new(None);
        let kinds = kinds();

        for op in ops {
            match op {
                SiloOp::Link { silo, utilizer } => {
                    let before: Vec<u64> = kinds.iter().map(|k| s.total(k)).collect();
                    s.world.link(s.silos[silo], s.utilizers[utilizer]);
                    let after: Vec<u64> = kinds.iter().map(|k| s.total(k)).collect();
                    prop_assert_eq!(before, after);
                }
                SiloOp::Unlink { silo, utilizer } => {
                    s.world.unlink(s.silos[silo], s.utilizers[utilizer]);
                }
                SiloOp::SetPower { silo, powered } => {
                    s.world.set_powered(s.silos[silo], powered);
                }
                SiloOp::Withdraw { utilizer, kind, amount: qty } => {
                    let kind = &kinds[kind];
                    let lathe = s.utilizers[utilizer];
                    let before = s.total(kind);
                    let pooled = s
                        .world
                        .active_silo(lathe)
                        .map_or(0, |silo| amount(&s.world, silo, kind));

                    let owed = s.world.silo_withdraw(lathe, kind, qty);

                    prop_assert_eq!(owed, qty - pooled.min(qty));
                    prop_assert_eq!(s.total(kind), before - u64::from(qty - owed));
                }
                SiloOp::Give { utilizer, kind, amount: qty } => {
                    give(&mut s.world, s.utilizers[utilizer], &kinds[kind], qty);
                }
            }
            prop_assert!(s.relation_consistent());
        }
    }
}
