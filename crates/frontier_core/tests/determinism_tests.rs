use frontier_core::ai::RootAi;
use frontier_core::factions::FactionId;
use frontier_core::simulation::Simulator;
use frontier_test_utils::determinism::{
    find_first_divergence, run_parallel_simulations, verify_determinism, world_json,
};
use frontier_test_utils::fixtures::{reference_scenario, REFERENCE_TICKS};
use frontier_test_utils::proptest::prelude::*;
use frontier_test_utils::strategies::{arb_command_script, run_script, ScriptedCommand};

/// Reference scenario with both sides played by the skirmish tree.
fn ai_run(ticks: u64, record: bool) -> (Simulator, Vec<u64>) {
    let (mut sim, _) = reference_scenario();
    if record {
        sim.enable_replay_recording();
    }
    let mut opponents = [
        RootAi::skirmish(FactionId(0), 3, 20_000, 15),
        RootAi::skirmish(FactionId(1), 9, 20_000, 15),
    ];
    let mut hashes = Vec::with_capacity(ticks as usize);
    for _ in 0..ticks {
        for ai in &mut opponents {
            ai.step(&mut sim);
        }
        sim.tick();
        hashes.push(sim.last_tick_hash());
    }
    (sim, hashes)
}

fn scripted_run(script: &[ScriptedCommand], ticks: u64) -> (Simulator, Vec<u64>) {
    let (mut sim, entities) = reference_scenario();
    let units: Vec<_> = entities.soldiers.iter().chain(&entities.workers).copied().collect();
    let targets: Vec<_> = entities
        .nodes
        .iter()
        .chain(&entities.soldiers)
        .chain(&entities.workers)
        .copied()
        .collect();
    let mut hashes = Vec::with_capacity(ticks as usize);
    for _ in 0..ticks {
        run_script(&mut sim, &units, &targets, script, 1);
        hashes.push(sim.last_tick_hash());
    }
    (sim, hashes)
}

#[test]
fn reference_scenario_is_deterministic() {
    verify_determinism(
        3,
        REFERENCE_TICKS,
        || reference_scenario().0,
        |sim| sim.tick(),
        Simulator::last_tick_hash,
    )
    .assert_deterministic();
}

#[test]
fn reference_scenario_matches_on_parallel_threads() {
    run_parallel_simulations(|| reference_scenario().0, 6, 300).assert_deterministic();
}

#[test]
fn hash_sequences_never_diverge() {
    assert_eq!(find_first_divergence(|| reference_scenario().0, REFERENCE_TICKS), None);
}

#[test]
fn final_world_is_byte_identical() {
    let run = || {
        let (mut sim, _) = reference_scenario();
        sim.run_ticks(250);
        world_json(&sim)
    };
    assert_eq!(run(), run());
}

#[test]
fn seed_changes_the_hash() {
    let content = frontier_test_utils::fixtures::reference_content();
    let mut config = frontier_test_utils::fixtures::reference_config();
    let mut a = Simulator::with_content(config.clone(), content.clone());
    config.seed ^= 0x5555;
    let mut b = Simulator::with_content(config, content);
    a.run_ticks(1);
    b.run_ticks(1);
    assert_ne!(a.last_tick_hash(), b.last_tick_hash());
}

#[test]
fn ai_driven_runs_hash_identically() {
    let (first, first_hashes) = ai_run(300, false);
    let (second, second_hashes) = ai_run(300, false);
    assert_eq!(first_hashes, second_hashes);
    assert_eq!(world_json(&first), world_json(&second));

    let (mut plain, _) = reference_scenario();
    let plain_hashes: Vec<u64> = (0..300)
        .map(|_| {
            plain.tick();
            plain.last_tick_hash()
        })
        .collect();
    assert_ne!(first_hashes, plain_hashes, "the opponents never acted");
}

#[test]
fn ai_decisions_replay_without_the_tree() {
    let (mut sim, hashes) = ai_run(200, true);
    sim.try_load_replay_tick(60).unwrap();
    for expected in &hashes[60..] {
        sim.tick();
        assert_eq!(sim.last_tick_hash(), *expected, "tick {}", sim.current_tick());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn random_command_scripts_replay_identically(script in arb_command_script(24, 120, 16)) {
        let (first, first_hashes) = scripted_run(&script, 150);
        let (second, second_hashes) = scripted_run(&script, 150);
        prop_assert_eq!(first_hashes, second_hashes);
        prop_assert_eq!(world_json(&first), world_json(&second));
    }
}
