//! Hash-based reproducibility checks.
//!
//! Every helper here builds simulators from a setup closure, drives them
//! the same way and compares tick hashes or serialized worlds.
//!
//! # Testing Strategy
//!
//! Lockstep peers, replays and rollback all assume that the same input
//! yields the same state on every run. Sources of non-determinism include:
//!
//! - **Floating-point math**: the core works in integer milli-units and
//!   [`frontier_core::math::Fixed`] factors only.
//!
//! - **Map iteration order**: every keyed collection in the world is a
//!   `BTreeMap` and entity arrays are walked in index order.
//!
//! - **System randomness**: the only RNG is the seeded one in the world.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual subsystems in the core crate
//! 2. **Property tests**: random command scripts still replay identically
//! 3. **Integration tests**: full scenarios are reproducible
//! 4. **Parallel tests**: N simulations on N threads all match

use std::thread;

use frontier_core::simulation::Simulator;

/// Final hashes from repeated runs of the same setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashReport {
    /// Final hash of each run, in run order.
    pub hashes: Vec<u64>,
    /// Ticks every run simulated.
    pub ticks: u64,
}

impl HashReport {
    /// Every run ended on the same hash.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.first_mismatch().is_none()
    }

    /// Index of the first run whose hash differs from run 0.
    #[must_use]
    pub fn first_mismatch(&self) -> Option<usize> {
        let first = *self.hashes.first()?;
        self.hashes.iter().position(|&h| h != first)
    }

    /// Distinct hashes, sorted.
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// # Panics
    ///
    /// Panics with every hash listed when the runs disagree.
    pub fn assert_deterministic(&self) {
        if let Some(run) = self.first_mismatch() {
            panic!(
                "non-deterministic after {} ticks: run {run} diverged from run 0 \
                 ({} distinct hashes across {} runs: {:#x?})",
                self.ticks,
                self.unique_hashes().len(),
                self.hashes.len(),
                self.hashes
            );
        }
    }
}

/// Build, step and hash any state `runs` times in sequence.
///
/// ```
/// use frontier_test_utils::determinism::verify_determinism;
/// use frontier_test_utils::fixtures::reference_scenario;
///
/// verify_determinism(3, 50, || reference_scenario().0, |sim| sim.tick(), |sim| sim.last_tick_hash())
///     .assert_deterministic();
/// ```
pub fn verify_determinism<S>(
    runs: usize,
    ticks: u64,
    setup: impl Fn() -> S,
    step: impl Fn(&mut S),
    hash: impl Fn(&S) -> u64,
) -> HashReport {
    let hashes = (0..runs)
        .map(|_| {
            let mut state = setup();
            (0..ticks).for_each(|_| step(&mut state));
            hash(&state)
        })
        .collect();
    HashReport { hashes, ticks }
}

/// Two sequential runs of `setup` end on the same tick hash.
pub fn verify_simulation_determinism(setup: impl Fn() -> Simulator, ticks: u64) -> bool {
    verify_determinism(2, ticks, setup, Simulator::tick, Simulator::last_tick_hash).is_deterministic()
}

/// Same as [`verify_determinism`] for simulators, but each run gets its
/// own scoped thread.
///
/// # Panics
///
/// Re-raises a panic from any simulation thread.
pub fn run_parallel_simulations<F>(setup: F, runs: usize, ticks: u64) -> HashReport
where
    F: Fn() -> Simulator + Sync,
{
    let hashes = thread::scope(|scope| {
        let workers: Vec<_> = (0..runs)
            .map(|_| {
                scope.spawn(|| {
                    let mut sim = setup();
                    sim.run_ticks(ticks);
                    sim.last_tick_hash()
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });
    HashReport { hashes, ticks }
}

/// Compare two runs tick by tick and report the first tick whose hash
/// differs, or `None` when they never diverge.
pub fn find_first_divergence(setup: impl Fn() -> Simulator, ticks: u64) -> Option<u64> {
    let (mut left, mut right) = (setup(), setup());
    if world_json(&left) != world_json(&right) {
        return Some(0);
    }
    (0..ticks).find_map(|_| {
        left.tick();
        right.tick();
        (left.last_tick_hash() != right.last_tick_hash()).then(|| left.current_tick())
    })
}

/// Serialized world state, for byte-for-byte comparisons.
///
/// # Panics
///
/// Panics if the snapshot cannot be serialized.
#[must_use]
pub fn world_json(sim: &Simulator) -> String {
    sim.capture_snapshot().to_json().unwrap()
}

/// Capture after `num_ticks`, restore into a freshly built simulator and
/// check both continue with identical hashes for `continue_ticks` more.
pub fn verify_snapshot_continuation<F>(setup_fn: F, num_ticks: u64, continue_ticks: u64) -> bool
where
    F: Fn() -> Simulator,
{
    let mut original = setup_fn();
    original.run_ticks(num_ticks);
    let snapshot = original.capture_snapshot();

    let mut restored = setup_fn();
    restored.apply_snapshot(&snapshot);
    if restored.capture_snapshot() != snapshot {
        return false;
    }

    (0..continue_ticks).all(|_| {
        original.tick();
        restored.tick();
        original.last_tick_hash() == restored.last_tick_hash()
    })
}
