//! Test fixtures and helpers.
//!
//! Pre-built content and scenarios for consistent testing. The reference
//! scenario is the one pinned by the golden hash test; changing anything
//! in it changes that hash.

use frontier_core::components::{EntityId, UnitTypeId};
use frontier_core::config::SimConfig;
use frontier_core::data::{AttackStats, BuildingData, ContentRegistry, GatherStats, UnitData};
use frontier_core::factions::{FactionId, ResourceKind, ResourceStock};
use frontier_core::math::Fixed;
use frontier_core::simulation::Simulator;

/// Ticks the reference scenario runs for.
pub const REFERENCE_TICKS: u64 = 500;

/// Map side of the reference scenario, in tiles.
pub const REFERENCE_MAP_TILES: i32 = 16;

/// Population cap of both reference factions.
pub const REFERENCE_POP_CAP: i32 = 50;

/// Registry index of the worker type in [`reference_content`].
pub const WORKER: UnitTypeId = UnitTypeId(0);

/// Registry index of the soldier type in [`reference_content`].
pub const SOLDIER: UnitTypeId = UnitTypeId(1);

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Worker used by the reference scenario.
#[must_use]
pub fn worker_data() -> UnitData {
    UnitData {
        id: "worker".to_string(),
        speed: 2500,
        max_hp: 50,
        gather: GatherStats {
            average_rate: 2000,
            carry_capacity: 10,
            ..GatherStats::default()
        },
        is_worker: true,
        pop_cost: 1,
        cost: ResourceStock::new(50, 0, 0, 0),
        ..UnitData::default()
    }
}

/// Soldier used by the reference scenario.
#[must_use]
pub fn soldier_data() -> UnitData {
    UnitData {
        id: "soldier".to_string(),
        speed: 3000,
        max_hp: 60,
        attack: AttackStats {
            damage: 8,
            range: 1500,
            cooldown_ms: 1000,
            ..AttackStats::default()
        },
        pop_cost: 1,
        cost: ResourceStock::new(60, 20, 0, 0),
        train_time_ms: 3000,
        ..UnitData::default()
    }
}

/// Content with the two reference unit types and a drop-off building.
///
/// Buildings: `0` town center (3x3, drop-off, +10 population), `1` house.
#[must_use]
pub fn reference_content() -> ContentRegistry {
    ContentRegistry {
        units: vec![worker_data(), soldier_data()],
        buildings: vec![
            BuildingData {
                id: "town_center".to_string(),
                max_hp: 2400,
                footprint_w: 3,
                footprint_h: 3,
                build_time_ms: 20_000,
                cost: ResourceStock::new(0, 200, 100, 0),
                provides_population: 10,
                ..BuildingData::default()
            },
            BuildingData {
                id: "house".to_string(),
                max_hp: 550,
                build_time_ms: 5000,
                cost: ResourceStock::new(0, 30, 0, 0),
                provides_population: 5,
                ..BuildingData::default()
            },
        ],
        techs: Vec::new(),
    }
}

/// Config of the reference scenario.
#[must_use]
pub fn reference_config() -> SimConfig {
    SimConfig {
        map_width: REFERENCE_MAP_TILES,
        map_height: REFERENCE_MAP_TILES,
        ..SimConfig::default()
    }
}

/// Entities spawned by [`reference_scenario`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceEntities {
    /// Workers, faction 0 first.
    pub workers: Vec<EntityId>,
    /// Soldiers, faction 0 first.
    pub soldiers: Vec<EntityId>,
    /// Food node then wood node.
    pub nodes: Vec<EntityId>,
}

/// Two factions with five workers and three soldiers each, a food and a
/// wood node, and every command already issued at tick 0.
///
/// Workers of faction 0 gather food, those of faction 1 gather wood. All
/// soldiers walk to the middle of the map, where they meet.
///
/// # Panics
///
/// Panics if the fixture no longer fits the population cap.
#[must_use]
pub fn reference_scenario() -> (Simulator, ReferenceEntities) {
    let mut sim = Simulator::with_content(reference_config(), reference_content());
    let mut entities = ReferenceEntities::default();
    for faction in [FactionId(0), FactionId(1)] {
        sim.set_faction_pop_cap(faction, REFERENCE_POP_CAP).unwrap();
    }

    for i in 0..5 {
        entities
            .workers
            .push(sim.spawn_unit(WORKER, FactionId(0), 1000 + i * 300, 1000, 0).unwrap());
    }
    for i in 0..5 {
        entities
            .workers
            .push(sim.spawn_unit(WORKER, FactionId(1), 8000 + i * 300, 8000, 0).unwrap());
    }
    for i in 0..3 {
        entities
            .soldiers
            .push(sim.spawn_unit(SOLDIER, FactionId(0), 1200 + i * 200, 1200, 0).unwrap());
    }
    for i in 0..3 {
        entities
            .soldiers
            .push(sim.spawn_unit(SOLDIER, FactionId(1), 7800 + i * 200, 7800, 0).unwrap());
    }
    let food = sim.spawn_resource_node(ResourceKind::Food, 4000, 4000, 500);
    let wood = sim.spawn_resource_node(ResourceKind::Wood, 4200, 4000, 500);
    entities.nodes = vec![food, wood];

    for (i, &worker) in entities.workers.iter().enumerate() {
        sim.issue_gather(worker, if i < 5 { food } else { wood });
    }
    for &soldier in &entities.soldiers {
        sim.issue_move(soldier, 5000, 5000);
    }
    (sim, entities)
}

/// Run the reference scenario to completion and return its final hash.
#[must_use]
pub fn run_reference_scenario() -> u64 {
    let (mut sim, _) = reference_scenario();
    sim.run_ticks(REFERENCE_TICKS);
    sim.last_tick_hash()
}

/// A single faction with a completed town center, three workers and one
/// food node in reach. Used to check resource conservation.
///
/// Returns the simulator, the workers and the node.
///
/// # Panics
///
/// Panics if the fixture can no longer be placed.
#[must_use]
pub fn economy_scenario(node_amount: i32) -> (Simulator, Vec<EntityId>, EntityId) {
    let mut sim = Simulator::with_content(reference_config(), reference_content());
    sim.spawn_building(frontier_core::components::BuildingTypeId(0), FactionId(0), 2000, 2000)
        .unwrap();
    let node = sim.spawn_resource_node(ResourceKind::Food, 8500, 3500, node_amount);
    let workers: Vec<EntityId> = (0..3)
        .map(|i| {
            sim.spawn_unit(WORKER, FactionId(0), 6000 + i * 400, 3000, 0)
                .unwrap()
        })
        .collect();
    for &worker in &workers {
        sim.issue_gather(worker, node);
    }
    (sim, workers, node)
}
