//! Silo network example: two lathes pooling materials through one silo.
//!
//! Links a stocked lathe to a silo, feeds sheets into a second lathe,
//! draws materials for a print job, then cuts the silo's power to show the
//! lathes falling back to their own hoppers.
//!
//! Run with: `RUST_LOG=debug cargo run -p silo-system --example silo_network [config.ron]`

use std::path::Path;

use silo_core::id::{EntityId, MaterialKind};
use silo_core::ledger::{MaterialStorage, PhysicalComposition};
use silo_core::power::PowerReceiver;
use silo_core::world::World;
use silo_system::{MaterialSiloSystem, SiloConfig, SiloWorldExt};

fn machine(world: &mut World, name: &str, storage: MaterialStorage) -> EntityId {
    let entity = world.spawn(name);
    world.add_material_storage(entity, storage);
    world.add_power_receiver(entity, PowerReceiver::default());
    entity
}

fn report(world: &World, entities: &[EntityId], kinds: &[MaterialKind]) {
    for &entity in entities {
        let stock: Vec<String> = kinds
            .iter()
            .map(|k| format!("{k}={}", world.material_amount(entity, k)))
            .collect();
        println!("  {:<8} {}", world.name(entity).unwrap_or("?"), stock.join(" "));
    }
    println!();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SiloConfig::load(Path::new(&path))?,
        None => SiloConfig::default(),
    };
    println!("Config: {config:?}\n");

    let mut world = World::new();
    world.register_module(Box::new(MaterialSiloSystem::with_config(config)));

    let steel = MaterialKind::from("steel");
    let glass = MaterialKind::from("glass");
    let kinds = [steel.clone(), glass.clone()];

    let silo = machine(&mut world, "silo", MaterialStorage::with_limit(5_000));
    let lathe_a = machine(&mut world, "lathe_a", MaterialStorage::new());
    let lathe_b = machine(&mut world, "lathe_b", MaterialStorage::new());
    world.make_silo(silo);
    world.make_utilizer(lathe_a);
    world.make_utilizer(lathe_b);
    let everyone = [silo, lathe_a, lathe_b];

    // --- Scenario 1: linking migrates existing stock ---

    println!("=== Scenario 1: link a stocked lathe ===\n");
    world.change_material_amount(lathe_a, &steel, 400);
    world.change_material_amount(lathe_a, &glass, 150);
    world.link(silo, lathe_a);
    world.link(silo, lathe_b);
    report(&world, &everyone, &kinds);

    // --- Scenario 2: inserted sheets land in the silo ---

    println!("=== Scenario 2: feed 3 glass sheets into lathe_b ===\n");
    let sheets = world.spawn_material(
        "glass_sheets",
        PhysicalComposition::new(3).with_material(glass.clone(), 100),
    );
    world.try_insert_material_entity(None, sheets, lathe_b);
    report(&world, &everyone, &kinds);

    // --- Scenario 3: a print job draws from the pool ---

    println!("=== Scenario 3: lathe_b prints a part (300 steel, 200 glass) ===\n");
    let steel_ok = world.silo_consume(lathe_b, &steel, 300);
    let glass_ok = world.silo_consume(lathe_b, &glass, 200);
    println!("  steel drawn: {steel_ok}, glass drawn: {glass_ok}\n");
    report(&world, &everyone, &kinds);

    // --- Scenario 4: the silo loses power ---

    println!("=== Scenario 4: silo unpowered ===\n");
    world.set_powered(silo, false);
    let owed = world.silo_withdraw(lathe_a, &steel, 50);
    println!("  lathe_a asked for 50 steel, silo covered {}\n", 50 - owed);
    world.set_powered(silo, true);
    let owed = world.silo_withdraw(lathe_a, &steel, 50);
    println!("  power restored, silo covered {}\n", 50 - owed);
    report(&world, &everyone, &kinds);

    Ok(())
}
