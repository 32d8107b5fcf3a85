use frontier_core::components::{BuildingTypeId, TechId};
use frontier_core::data::{ContentRegistry, TechData, TechEffect};
use frontier_core::factions::{FactionId, ResourceStock};
use frontier_core::math::Fixed;
use frontier_core::simulation::Simulator;
use frontier_core::snapshot::{WorldSnapshot, SNAPSHOT_VERSION};
use frontier_test_utils::determinism::{verify_snapshot_continuation, world_json};
use frontier_test_utils::fixtures::{
    reference_config, reference_content, reference_scenario, SOLDIER,
};

fn content_with_research() -> ContentRegistry {
    let mut content = reference_content();
    content.techs.push(TechData {
        id: "bronze_tools".to_string(),
        cost: ResourceStock::new(100, 0, 0, 0),
        research_time_ms: 20_000,
        effects: vec![TechEffect::GatherRateMul {
            factor: Fixed::from_num(3) / 2,
        }],
        ..TechData::default()
    });
    content
}

/// Mid-game state with queued orders, detour paths, training and research
/// in flight.
fn busy() -> Simulator {
    let mut sim = Simulator::with_content(reference_config(), content_with_research());
    sim.set_faction_resources(FactionId(0), ResourceStock::new(1000, 1000, 1000, 0))
        .unwrap();
    let tc = sim
        .spawn_building(BuildingTypeId(0), FactionId(0), 1000, 9000)
        .unwrap();
    sim.enqueue_train(tc, SOLDIER).unwrap();
    sim.enqueue_train(tc, SOLDIER).unwrap();
    sim.start_research(TechId(0), FactionId(0)).unwrap();
    for y in 0..12 {
        sim.set_terrain_blocked(7, y, true);
    }
    for i in 0..6 {
        let faction = FactionId(i / 3);
        let y = if faction.0 == 0 { 2000 } else { 14_500 };
        let x = 2000 + i32::from(i % 3) * 400;
        let unit = sim.spawn_unit(SOLDIER, faction, x, y, 0).unwrap();
        sim.issue_move(unit, 12_000, y - 500);
        sim.issue_attack_move(unit, 13_000, 8000);
    }
    sim.run_ticks(40);
    sim
}

#[test]
fn capture_apply_is_idempotent() {
    let sim = busy();
    let snapshot = sim.capture_snapshot();
    assert!(!snapshot.order_queues.is_empty());
    assert!(!snapshot.paths.is_empty());
    assert!(snapshot.factions[0].research.iter().any(|s| s.tech.is_some()));

    let mut restored = Simulator::with_content(reference_config(), content_with_research());
    restored.apply_snapshot(&snapshot);
    assert_eq!(restored.capture_snapshot(), snapshot);
    assert_eq!(world_json(&restored), world_json(&sim));
}

#[test]
fn json_round_trip_preserves_snapshot() {
    let snapshot = busy().capture_snapshot();
    let text = snapshot.to_json().unwrap();
    let (decoded, report) = WorldSnapshot::from_json(&text).unwrap();
    assert_eq!(decoded, snapshot);
    assert_eq!(report.from_version, SNAPSHOT_VERSION);
    assert!(report.migrations_applied.is_empty());
}

#[test]
fn restored_simulator_continues_identically() {
    assert!(verify_snapshot_continuation(busy, 0, 200));
    assert!(verify_snapshot_continuation(|| reference_scenario().0, 120, 200));
}

#[test]
fn loading_into_a_running_simulator_rewinds_it() {
    let mut sim = busy();
    let saved = sim.save_snapshot_json().unwrap();
    let hash_at_save = sim.last_tick_hash();
    sim.run_ticks(60);

    sim.load_snapshot_json(&saved).unwrap();
    assert_eq!(sim.current_tick(), 40);
    assert_eq!(sim.last_tick_hash(), hash_at_save);
    assert!(sim.hash_at_tick(41).is_none());
}

#[test]
fn research_progress_survives_restore() {
    let mut sim = busy();
    let snapshot = sim.capture_snapshot();
    let mut restored = Simulator::with_content(reference_config(), content_with_research());
    restored.apply_snapshot(&snapshot);

    sim.run_ticks(400);
    restored.run_ticks(400);
    assert!(sim.faction(FactionId(0)).unwrap().has_tech(TechId(0)));
    assert_eq!(
        sim.unit_types().version(),
        restored.unit_types().version()
    );
    assert_eq!(sim.last_tick_hash(), restored.last_tick_hash());
}
