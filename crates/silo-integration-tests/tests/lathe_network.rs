//! Integration test: a station workshop sharing one silo.
//!
//! Two lathes and a circuit imprinter are linked to a single silo. Stock
//! inserted into any machine pools in the silo; production on any machine
//! draws from the pool first and from the machine's own hopper second.
//! Cutting the silo's power isolates every machine without losing stock.

use silo_core::ledger::MaterialStorage;
use silo_core::test_utils::*;
use silo_core::world::World;
use silo_system::{MaterialSiloSystem, SiloWorldExt};

#[test]
fn workshop_shares_one_pool() {
    let mut world = World::new();
    world.register_module(Box::new(MaterialSiloSystem::new()));

    let silo = spawn_machine_with(&mut world, "silo", MaterialStorage::with_limit(10_000));
    world.make_silo(silo);
    let lathe = spawn_lathe(&mut world);
    let autolathe = spawn_machine(&mut world, "autolathe");
    let imprinter = spawn_machine(&mut world, "circuit_imprinter");
    for machine in [lathe, autolathe, imprinter] {
        world.make_utilizer(machine);
    }

    // The autolathe already holds stock before it is wired up.
    give(&mut world, autolathe, &steel(), 500);
    give(&mut world, autolathe, &glass(), 250);

    for machine in [lathe, autolathe, imprinter] {
        assert!(world.link(silo, machine));
    }
    assert_eq!(world.utilizers_of(silo), vec![lathe, autolathe, imprinter]);
    assert_eq!(amount(&world, silo, &steel()), 500);
    assert_eq!(amount(&world, silo, &glass()), 250);
    assert!(world.ledger().storage(autolathe).is_some_and(|s| s.storage.is_empty()));

    // Sheets fed into the imprinter pool in the silo.
    let gold_sheets = spawn_sheets(&mut world, gold(), 2);
    assert!(world.try_insert_material_entity(None, gold_sheets, imprinter));
    assert_eq!(amount(&world, silo, &gold()), 2 * SHEET_UNITS);
    assert_eq!(amount(&world, imprinter, &gold()), 0);

    // The lathe can see and spend what the autolathe brought in.
    assert_eq!(world.silo_available(lathe, &steel()), 500);
    assert!(world.silo_consume(lathe, &steel(), 300));
    assert_eq!(amount(&world, silo, &steel()), 200);

    // Power cut: nothing is intercepted and nothing is drawn from the pool.
    world.set_powered(silo, false);
    let glass_sheets = spawn_sheets(&mut world, glass(), 1);
    assert!(world.try_insert_material_entity(None, glass_sheets, lathe));
    assert_eq!(amount(&world, lathe, &glass()), SHEET_UNITS);
    assert_eq!(world.silo_withdraw(lathe, &glass(), 50), 50);
    assert_eq!(amount(&world, silo, &glass()), 250);
    assert_eq!(world.silo_available(lathe, &glass()), u64::from(SHEET_UNITS));

    // Power back: the pool is reachable again, and stock survived the cut.
    world.set_powered(silo, true);
    assert_eq!(
        world.silo_available(lathe, &glass()),
        250 + u64::from(SHEET_UNITS)
    );

    // Unhooking the imprinter leaves the others attached.
    assert!(world.unlink(silo, imprinter));
    assert_eq!(world.silo_of(imprinter), None);
    assert_eq!(world.utilizers_of(silo), vec![lathe, autolathe]);
    assert_eq!(world.silo_withdraw(imprinter, &gold(), 10), 10);
}

#[test]
fn five_steel_then_withdraw_eight() {
    let mut world = World::new();
    world.register_module(Box::new(MaterialSiloSystem::new()));
    let silo = spawn_machine(&mut world, "silo");
    world.make_silo(silo);
    let lathe = spawn_lathe(&mut world);
    world.make_utilizer(lathe);
    give(&mut world, lathe, &steel(), 5);

    world.link(silo, lathe);
    assert_eq!(amount(&world, silo, &steel()), 5);
    assert_eq!(amount(&world, lathe, &steel()), 0);

    assert_eq!(world.silo_withdraw(lathe, &steel(), 8), 3);
    assert_eq!(amount(&world, silo, &steel()), 0);
}

#[test]
fn without_silo_system_machines_work_alone() {
    let mut world = World::new();
    let silo = spawn_machine(&mut world, "silo");
    let lathe = spawn_lathe(&mut world);
    assert!(!world.make_silo(silo));
    assert!(!world.make_utilizer(lathe));
    give(&mut world, lathe, &steel(), 5);

    world.link(silo, lathe);

    assert_eq!(amount(&world, lathe, &steel()), 5);
    assert_eq!(world.silo_withdraw(lathe, &steel(), 4), 4);
    assert!(world.silo_consume(lathe, &steel(), 4));
    assert_eq!(amount(&world, lathe, &steel()), 1);
}
