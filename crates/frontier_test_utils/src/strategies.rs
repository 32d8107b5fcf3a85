//! Proptest strategies for simulation testing.
//!
//! These generate random but reproducible inputs: positions inside the
//! reference map and command scripts addressed to units by slot, so the
//! same script can drive any number of independently built simulators.

use proptest::prelude::*;

use frontier_core::components::{CommandKind, EntityId};
use frontier_core::simulation::Simulator;

use crate::fixtures::REFERENCE_MAP_TILES;

/// Largest coordinate on the reference map, in milli-units.
pub const REFERENCE_MAP_EXTENT: i32 = REFERENCE_MAP_TILES * 1000 - 1;

/// A command issued to the unit in `slot` when the simulator reaches `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedCommand {
    /// Tick at which the command is issued.
    pub tick: u64,
    /// Index into the unit list handed to [`apply_script`].
    pub slot: usize,
    /// What to do.
    pub kind: CommandKind,
    /// Target x, or an index into the target list for entity commands.
    pub x: i32,
    /// Target y.
    pub y: i32,
}

/// A position inside the reference map.
pub fn arb_position() -> impl Strategy<Value = (i32, i32)> {
    (0..=REFERENCE_MAP_EXTENT, 0..=REFERENCE_MAP_EXTENT)
}

/// Any command kind.
pub fn arb_command_kind() -> impl Strategy<Value = CommandKind> {
    prop_oneof![
        4 => Just(CommandKind::Move),
        2 => Just(CommandKind::AttackMove),
        2 => Just(CommandKind::Attack),
        1 => Just(CommandKind::Gather),
        1 => Just(CommandKind::Stop),
    ]
}

/// One scripted command within `max_tick` ticks for `slots` units.
pub fn arb_scripted_command(max_tick: u64, slots: usize) -> impl Strategy<Value = ScriptedCommand> {
    (0..max_tick, 0..slots.max(1), arb_command_kind(), arb_position()).prop_map(
        |(tick, slot, kind, (x, y))| ScriptedCommand {
            tick,
            slot,
            kind,
            x,
            y,
        },
    )
}

/// A script of up to `max_len` commands, sorted by tick.
pub fn arb_command_script(
    max_len: usize,
    max_tick: u64,
    slots: usize,
) -> impl Strategy<Value = Vec<ScriptedCommand>> {
    proptest::collection::vec(arb_scripted_command(max_tick, slots), 0..max_len).prop_map(
        |mut script| {
            script.sort_by_key(|c| c.tick);
            script
        },
    )
}

/// Hit points for spawned units, including zero ("use max HP").
pub fn arb_hp() -> impl Strategy<Value = i32> {
    0i32..200
}

/// Issue every command of `script` due at the simulator's current tick.
///
/// Entity-targeted kinds pick their target from `targets` by `x` modulo
/// its length; they are skipped when `targets` is empty.
pub fn apply_script(
    sim: &mut Simulator,
    units: &[EntityId],
    targets: &[EntityId],
    script: &[ScriptedCommand],
) {
    let tick = sim.current_tick();
    for command in script.iter().filter(|c| c.tick == tick) {
        let Some(&unit) = units.get(command.slot % units.len().max(1)) else {
            continue;
        };
        match command.kind {
            CommandKind::Move => sim.issue_move(unit, command.x, command.y),
            CommandKind::AttackMove => sim.issue_attack_move(unit, command.x, command.y),
            CommandKind::Stop => sim.issue_stop(unit),
            CommandKind::Attack | CommandKind::Gather => {
                if targets.is_empty() {
                    continue;
                }
                let target = targets[command.x.unsigned_abs() as usize % targets.len()];
                if command.kind == CommandKind::Attack {
                    sim.issue_attack(unit, target);
                } else {
                    sim.issue_gather(unit, target);
                }
            }
        }
    }
}

/// Run `ticks` ticks, issuing `script` along the way.
pub fn run_script(
    sim: &mut Simulator,
    units: &[EntityId],
    targets: &[EntityId],
    script: &[ScriptedCommand],
    ticks: u64,
) {
    for _ in 0..ticks {
        apply_script(sim, units, targets, script);
        sim.tick();
    }
}
