use frontier_core::components::{BuildingTypeId, EntityId};
use frontier_core::config::SimConfig;
use frontier_core::data::UnitData;
use frontier_core::error::GameError;
use frontier_core::factions::{FactionId, ResourceKind, ResourceStock};
use frontier_core::math::distance_squared;
use frontier_core::simulation::Simulator;
use frontier_test_utils::determinism::world_json;
use frontier_test_utils::fixtures::{
    economy_scenario, reference_config, reference_content, REFERENCE_POP_CAP, SOLDIER, WORKER,
};
use frontier_test_utils::proptest::prelude::*;
use frontier_test_utils::strategies::{arb_position, REFERENCE_MAP_EXTENT};

fn food_in_system(sim: &Simulator, node: EntityId) -> i64 {
    let stock = i64::from(sim.faction(FactionId(0)).unwrap().resources.get(ResourceKind::Food));
    let carried: i64 = sim
        .world()
        .units
        .iter()
        .filter(|u| u.carry_kind == ResourceKind::Food)
        .map(|u| i64::from(u.carry_amount))
        .sum();
    let remaining = i64::from(sim.world().resource_node(node).map_or(0, |n| n.amount_remaining));
    stock + carried + remaining
}

#[test]
fn gathering_conserves_resources() {
    let (mut sim, workers, node) = economy_scenario(75);
    let total = food_in_system(&sim, node);
    assert_eq!(total, 75);

    for _ in 0..3000 {
        sim.tick();
        let amount = sim.world().resource_node(node).unwrap().amount_remaining;
        assert!(amount >= 0, "node went negative at tick {}", sim.current_tick());
        assert_eq!(food_in_system(&sim, node), total);
    }

    assert_eq!(sim.world().resource_node(node).unwrap().amount_remaining, 0);
    assert_eq!(
        sim.faction(FactionId(0)).unwrap().resources.get(ResourceKind::Food),
        75
    );
    for worker in workers {
        assert_eq!(sim.world().unit(worker).unwrap().carry_amount, 0);
    }
}

#[test]
fn population_never_exceeds_cap() {
    let mut sim = Simulator::with_content(reference_config(), reference_content());
    let faction = FactionId(0);
    sim.set_faction_resources(faction, ResourceStock::new(100_000, 100_000, 0, 0))
        .unwrap();
    let tc = sim
        .spawn_building(BuildingTypeId(0), faction, 3000, 3000)
        .unwrap();
    for i in 0..4 {
        sim.spawn_unit(WORKER, faction, 1000 + i * 300, 1000, 0).unwrap();
    }

    let mut refused_for_housing = 0;
    for _ in 0..900 {
        match sim.enqueue_train(tc, SOLDIER) {
            Ok(()) | Err(GameError::ProductionQueueFull(_)) => {}
            Err(GameError::PopulationCapReached { .. }) => refused_for_housing += 1,
            Err(other) => panic!("unexpected rejection: {other}"),
        }
        sim.tick();
        let state = sim.faction(faction).unwrap();
        assert!(state.pop <= state.pop_cap, "pop {} > cap {}", state.pop, state.pop_cap);
    }
    assert_eq!(sim.faction(faction).unwrap().pop, 10);
    // Items finishing without room are dropped, after which the queue drains
    // and new orders are refused up front.
    assert!(refused_for_housing > 0);
}

#[test]
fn spawn_respects_reference_pop_cap() {
    let mut sim = Simulator::with_content(reference_config(), reference_content());
    sim.set_faction_pop_cap(FactionId(1), REFERENCE_POP_CAP).unwrap();
    for _ in 0..REFERENCE_POP_CAP {
        sim.spawn_unit(SOLDIER, FactionId(1), 5000, 5000, 0).unwrap();
    }
    let err = sim.spawn_unit(WORKER, FactionId(1), 5000, 5000, 0).unwrap_err();
    assert!(matches!(err, GameError::PopulationCapReached { .. }));
    assert_eq!(sim.faction(FactionId(1)).unwrap().pop, REFERENCE_POP_CAP);
}

#[test]
fn failed_train_leaves_state_identical() {
    let mut sim = Simulator::with_content(reference_config(), reference_content());
    let faction = FactionId(0);
    let tc = sim
        .spawn_building(BuildingTypeId(0), faction, 3000, 3000)
        .unwrap();

    // Broke.
    let before = world_json(&sim);
    assert!(matches!(
        sim.enqueue_train(tc, SOLDIER),
        Err(GameError::InsufficientResources { .. })
    ));
    assert_eq!(world_json(&sim), before);

    // Full queue.
    sim.set_faction_resources(faction, ResourceStock::new(5000, 5000, 0, 0))
        .unwrap();
    for _ in 0..5 {
        sim.enqueue_train(tc, WORKER).unwrap();
    }
    let before = world_json(&sim);
    assert!(matches!(
        sim.enqueue_train(tc, WORKER),
        Err(GameError::ProductionQueueFull(_))
    ));
    assert_eq!(world_json(&sim), before);

    // Housed out.
    sim.set_faction_pop_cap(faction, 1).unwrap();
    sim.spawn_unit(WORKER, faction, 9000, 9000, 0).unwrap();
    sim.cancel_production(tc).unwrap();
    let before = world_json(&sim);
    assert!(matches!(
        sim.enqueue_train(tc, SOLDIER),
        Err(GameError::PopulationCapReached { .. })
    ));
    assert_eq!(world_json(&sim), before);

    // Unknown type.
    assert!(sim.enqueue_train(tc, frontier_core::components::UnitTypeId(9)).is_err());
    assert_eq!(world_json(&sim), before);
}

#[test]
fn failed_construction_leaves_state_identical() {
    let mut sim = Simulator::with_content(reference_config(), reference_content());
    let faction = FactionId(0);
    sim.set_faction_resources(faction, ResourceStock::new(0, 250, 0, 0))
        .unwrap();
    sim.try_start_construction(faction, 4000, 4000, BuildingTypeId(1))
        .unwrap();

    let before = world_json(&sim);
    assert!(matches!(
        sim.try_start_construction(faction, 4000, 4000, BuildingTypeId(1)),
        Err(GameError::PlacementBlocked { x: 4, y: 4 })
    ));
    assert!(matches!(
        sim.try_start_construction(faction, 15_500, 8000, BuildingTypeId(1)),
        Err(GameError::PlacementBlocked { .. })
    ));
    assert!(matches!(
        sim.try_start_construction(faction, 9000, 9000, BuildingTypeId(0)),
        Err(GameError::InsufficientResources {
            resource: ResourceKind::Stone,
            ..
        })
    ));
    assert!(matches!(
        sim.try_start_construction(faction, 9000, 9000, BuildingTypeId(7)),
        Err(GameError::UnknownBuildingType(_))
    ));
    assert!(matches!(
        sim.try_start_construction(FactionId(200), 9000, 9000, BuildingTypeId(1)),
        Err(GameError::InvalidFaction(_))
    ));
    assert_eq!(world_json(&sim), before);
}

fn lone_runner(x: i32, y: i32) -> (Simulator, EntityId) {
    crowded_runner(x, y, &[])
}

/// A runner with idle bystanders at the given offsets from its start.
fn crowded_runner(x: i32, y: i32, crowd: &[(i32, i32)]) -> (Simulator, EntityId) {
    let mut sim = Simulator::new(SimConfig {
        map_width: 16,
        map_height: 16,
        ..SimConfig::default()
    });
    let runner = sim
        .register_unit_type(UnitData {
            speed: 3000,
            max_hp: 10,
            ..UnitData::default()
        })
        .unwrap();
    let unit = sim.spawn_unit(runner, FactionId(0), x, y, 0).unwrap();
    for &(dx, dy) in crowd {
        let (bx, by) = ((x + dx).clamp(0, REFERENCE_MAP_EXTENT), (y + dy).clamp(0, REFERENCE_MAP_EXTENT));
        sim.spawn_unit(runner, FactionId(0), bx, by, 0).unwrap();
    }
    (sim, unit)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn movement_never_overshoots(start in arb_position(), target in arb_position()) {
        let (mut sim, unit) = lone_runner(start.0, start.1);
        sim.issue_move(unit, target.0, target.1);
        sim.tick();

        let pos = |sim: &Simulator| {
            let u = sim.world().unit(unit).unwrap();
            (u.x, u.y)
        };
        let mut last = distance_squared(pos(&sim).0, pos(&sim).1, target.0, target.1);
        for _ in 0..200 {
            sim.tick();
            let (x, y) = pos(&sim);
            let now = distance_squared(x, y, target.0, target.1);
            prop_assert!(now <= last, "moved away: {} -> {}", last, now);
            last = now;
        }
        prop_assert_eq!(pos(&sim), target);
    }

    #[test]
    fn crowded_movement_never_overshoots(
        start in arb_position(),
        target in arb_position(),
        crowd in prop::collection::vec((-600..=600i32, -600..=600i32), 1..6),
    ) {
        let (mut sim, unit) = crowded_runner(start.0, start.1, &crowd);
        sim.issue_move(unit, target.0, target.1);

        let pos = |sim: &Simulator| {
            let u = sim.world().unit(unit).unwrap();
            (u.x, u.y)
        };
        let mut last = distance_squared(start.0, start.1, target.0, target.1);
        for _ in 0..200 {
            sim.tick();
            let (x, y) = pos(&sim);
            let now = distance_squared(x, y, target.0, target.1);
            prop_assert!(now <= last, "pushed away at tick {}: {} -> {}", sim.current_tick(), last, now);
            last = now;
        }
        prop_assert_eq!(pos(&sim), target);
    }
}
