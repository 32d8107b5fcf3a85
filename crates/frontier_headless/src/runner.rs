//! Headless run modes.
//!
//! Each mode builds simulators from a [`ScenarioSource`], drives them
//! without presentation and returns a serializable report. Nothing here
//! prints; `main` decides how reports are written.

use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use frontier_core::components::{Command, CommandKind};
use frontier_core::error::GameError;
use frontier_core::factions::{FactionId, ResourceKind};
use frontier_core::replay::ReplayTimeline;
use frontier_core::simulation::Simulator;
use frontier_core::world::WorldState;
use frontier_test_utils::loopback::LoopbackSession;

use crate::scenario::{ScenarioError, ScenarioSource};

/// Error type for headless runs.
#[derive(Error, Debug)]
pub enum HeadlessError {
    /// Scenario could not be loaded or built.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The simulator reported an error.
    #[error(transparent)]
    Game(#[from] GameError),
    /// A scrub target lies outside the recorded range.
    #[error("Scrub tick {tick} is outside the recording (0..={last})")]
    ScrubOutOfRange {
        /// Requested tick.
        tick: u64,
        /// Last recorded tick.
        last: u64,
    },
}

/// Per-faction summary at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactionSummary {
    /// Faction index.
    pub faction: u8,
    /// Units alive.
    pub units: usize,
    /// Buildings standing.
    pub buildings: usize,
    /// Population in use.
    pub pop: i32,
    /// Stockpile as `[food, wood, stone, metal]`.
    pub resources: [i32; 4],
    /// Whether the faction was defeated.
    pub defeated: bool,
}

/// Result of [`run_scenario`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Final tick hash as `0x`-prefixed hex.
    pub final_hash: String,
    /// The ten newest hashes, newest first.
    pub recent_hashes: Vec<(u64, String)>,
    /// Factions that ever owned something.
    pub factions: Vec<FactionSummary>,
    /// Domain events produced over the run.
    pub events: usize,
}

/// Result of [`verify_determinism`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks each run simulated.
    pub ticks: u64,
    /// Number of runs.
    pub runs: usize,
    /// Final hash of every run.
    pub hashes: Vec<String>,
    /// All hashes equal.
    pub deterministic: bool,
}

/// Result of [`replay_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks recorded.
    pub ticks: u64,
    /// Bytes written to the replay file.
    pub file_bytes: u64,
    /// Ticks with a stored snapshot.
    pub snapshot_ticks: Vec<u64>,
    /// Scrub targets that reproduced every later hash.
    pub verified: Vec<u64>,
    /// First `(scrub target, tick)` whose hash differed, if any.
    pub first_mismatch: Option<(u64, u64)>,
}

/// Result of [`lockstep_loopback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockstepReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks both peers simulated.
    pub ticks: u64,
    /// Input delay used.
    pub input_delay: u64,
    /// Commands sent through the session.
    pub commands: usize,
    /// Final hash of peer 0.
    pub final_hash: String,
    /// Both peers ended on the same hash.
    pub in_sync: bool,
}

fn hex(hash: u64) -> String {
    format!("{hash:#018x}")
}

fn faction_summaries(sim: &Simulator) -> Vec<FactionSummary> {
    let world: &WorldState = sim.world();
    world
        .factions
        .iter()
        .enumerate()
        .filter(|(_, f)| f.active)
        .map(|(i, f)| {
            let id = FactionId(i as u8);
            FactionSummary {
                faction: id.0,
                units: world.units.iter().filter(|u| u.faction == id).count(),
                buildings: world.buildings.iter().filter(|b| b.faction == id).count(),
                pop: f.pop,
                resources: ResourceKind::ALL.map(|k| f.resources.get(k)),
                defeated: f.defeated,
            }
        })
        .collect()
}

/// Run a scenario for `ticks` (or its own length) and summarize the end state.
pub fn run_scenario(source: &ScenarioSource, ticks: Option<u64>) -> Result<RunReport, HeadlessError> {
    let ticks = ticks.unwrap_or_else(|| source.ticks());
    let mut sim = source.build()?;
    info!(scenario = source.name(), ticks, "running scenario");
    sim.run_ticks(ticks);
    let events = sim.drain_events().len();
    Ok(RunReport {
        scenario: source.name().to_string(),
        ticks: sim.current_tick(),
        final_hash: hex(sim.last_tick_hash()),
        recent_hashes: sim
            .recent_hashes(10)
            .into_iter()
            .map(|(tick, hash)| (tick, hex(hash)))
            .collect(),
        factions: faction_summaries(&sim),
        events,
    })
}

/// Run the scenario `runs` times in parallel and compare final hashes.
pub fn verify_determinism(
    source: &ScenarioSource,
    runs: usize,
    ticks: Option<u64>,
) -> Result<VerifyReport, HeadlessError> {
    let ticks = ticks.unwrap_or_else(|| source.ticks());
    info!(scenario = source.name(), runs, ticks, "verifying determinism");
    let hashes = (0..runs.max(1))
        .into_par_iter()
        .map(|run| -> Result<u64, HeadlessError> {
            let mut sim = source.build()?;
            sim.run_ticks(ticks);
            debug!(run, hash = sim.last_tick_hash(), "run finished");
            Ok(sim.last_tick_hash())
        })
        .collect::<Result<Vec<u64>, HeadlessError>>()?;

    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        warn!(scenario = source.name(), ?hashes, "runs diverged");
    }
    Ok(VerifyReport {
        scenario: source.name().to_string(),
        ticks,
        runs: hashes.len(),
        hashes: hashes.into_iter().map(hex).collect(),
        deterministic,
    })
}

/// Record a replay, save it to `path`, load it into a fresh simulator and
/// check that scrubbing to each of `scrub_ticks` reproduces every later hash.
pub fn replay_check(
    source: &ScenarioSource,
    path: &Path,
    ticks: Option<u64>,
    scrub_ticks: &[u64],
) -> Result<ReplayReport, HeadlessError> {
    let ticks = ticks.unwrap_or_else(|| source.ticks());
    if let Some(&tick) = scrub_ticks.iter().find(|&&t| t > ticks) {
        return Err(HeadlessError::ScrubOutOfRange { tick, last: ticks });
    }

    let mut sim = source.build()?;
    sim.enable_replay_recording();
    let mut recorded = vec![sim.last_tick_hash()];
    for _ in 0..ticks {
        sim.tick();
        recorded.push(sim.last_tick_hash());
    }
    sim.save_replay(path)?;
    let file_bytes = std::fs::metadata(path).map_err(GameError::from)?.len();
    let snapshot_ticks = ReplayTimeline::load(path)?.snapshot_ticks().collect();

    let mut playback = Simulator::default();
    playback.load_replay(path)?;
    let mut verified = Vec::new();
    let mut first_mismatch = None;
    'targets: for &target in scrub_ticks {
        playback.try_load_replay_tick(target)?;
        while playback.current_tick() < ticks {
            playback.tick();
            let tick = playback.current_tick();
            if playback.last_tick_hash() != recorded[tick as usize] {
                warn!(target, tick, "replay diverged");
                first_mismatch = Some((target, tick));
                break 'targets;
            }
        }
        verified.push(target);
    }
    info!(path = %path.display(), verified = verified.len(), "replay checked");

    Ok(ReplayReport {
        scenario: source.name().to_string(),
        ticks,
        file_bytes,
        snapshot_ticks,
        verified,
        first_mismatch,
    })
}

/// Drive two in-process lockstep peers through `ticks` ticks.
///
/// Every 40 ticks one peer, alternating, sends its faction's first unit
/// to the opposite corner, so the session carries real input.
pub fn lockstep_loopback(
    source: &ScenarioSource,
    ticks: Option<u64>,
    input_delay: u64,
) -> Result<LockstepReport, HeadlessError> {
    let ticks = ticks.unwrap_or_else(|| source.ticks());
    let template = source.build()?;
    let mut session = LoopbackSession::new(|| template.clone(), input_delay);
    let extent = template.config().clamped_map_size().0 * 1000 - 1;
    info!(scenario = source.name(), ticks, input_delay, "lockstep loopback");

    let mut commands = 0;
    let mut last_issued = None;
    while session.peers[0].sim.current_tick() < ticks {
        let tick = session.peers[0].sim.current_tick();
        if tick % 40 == 20 && last_issued != Some(tick) {
            last_issued = Some(tick);
            let player = usize::from(tick % 80 == 20);
            let faction = FactionId(player as u8);
            let first = template.world().units.iter().find(|u| u.faction == faction);
            if let Some(unit) = first {
                let corner = if player == 0 { extent } else { 0 };
                session.queue(player, Command::at_point(0, CommandKind::Move, unit.id, corner, corner));
                commands += 1;
            }
        }
        session.round()?;
    }

    let [p0, _] = &session.peers;
    Ok(LockstepReport {
        scenario: source.name().to_string(),
        ticks: p0.sim.current_tick(),
        input_delay,
        commands,
        final_hash: hex(p0.sim.last_tick_hash()),
        in_sync: session.in_sync(),
    })
}
