//! Behavior-tree opponents.
//!
//! A [`RootAi`] is stepped once between simulation ticks and acts only
//! through the command API, so its decisions are journaled like any other
//! input. Replays and rollback reproduce them without running the tree.
//!
//! Composites keep a cursor: a child that reports [`BtStatus::Running`]
//! is resumed on the next step instead of restarting the composite.
//!
//! ```
//! use frontier_core::ai::{AiContext, AssignIdleWorkerToResource, RootAi};
//! use frontier_core::factions::FactionId;
//! use frontier_core::simulation::Simulator;
//!
//! let mut sim = Simulator::default();
//! let mut ai = RootAi::new(AssignIdleWorkerToResource, AiContext::new(FactionId(1), 7));
//! ai.step(&mut sim);
//! sim.tick();
//! ```

use std::fmt;

use tracing::trace;

use crate::components::{OrderType, QueuedOrder, Unit};
use crate::factions::FactionId;
use crate::math::distance_squared;
use crate::rng::DeterministicRng;
use crate::simulation::Simulator;

/// Result of stepping a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BtStatus {
    /// Still working; step again next tick.
    Running,
    /// Finished successfully.
    Success,
    /// Finished without effect.
    Failure,
}

/// Per-opponent state shared by every node of one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiContext {
    /// Faction the tree plays.
    pub faction: FactionId,
    /// Generator owned by this opponent. Independent of the world RNG, so
    /// drawing from it never perturbs the tick hash.
    pub rng: DeterministicRng,
}

impl AiContext {
    /// Context for `faction` with its own generator seeded from `seed`.
    #[must_use]
    pub const fn new(faction: FactionId, seed: u32) -> Self {
        Self {
            faction,
            rng: DeterministicRng::new(seed),
        }
    }
}

/// A behavior-tree node.
pub trait BtNode: fmt::Debug + Send {
    /// Run one step against the simulator.
    fn tick(&mut self, sim: &mut Simulator, ctx: &mut AiContext) -> BtStatus;
}

// ============================================================================
// Composites
// ============================================================================

/// Runs children in order until one fails.
#[derive(Debug, Default)]
pub struct Sequence {
    children: Vec<Box<dyn BtNode>>,
    cursor: usize,
}

impl Sequence {
    /// Empty sequence; succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child.
    #[must_use]
    pub fn with(mut self, child: impl BtNode + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }
}

impl BtNode for Sequence {
    fn tick(&mut self, sim: &mut Simulator, ctx: &mut AiContext) -> BtStatus {
        while let Some(child) = self.children.get_mut(self.cursor) {
            match child.tick(sim, ctx) {
                BtStatus::Success => self.cursor += 1,
                BtStatus::Failure => {
                    self.cursor = 0;
                    return BtStatus::Failure;
                }
                BtStatus::Running => return BtStatus::Running,
            }
        }
        self.cursor = 0;
        BtStatus::Success
    }
}

/// Runs children in order until one succeeds.
#[derive(Debug, Default)]
pub struct Selector {
    children: Vec<Box<dyn BtNode>>,
    cursor: usize,
}

impl Selector {
    /// Empty selector; fails immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child.
    #[must_use]
    pub fn with(mut self, child: impl BtNode + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }
}

impl BtNode for Selector {
    fn tick(&mut self, sim: &mut Simulator, ctx: &mut AiContext) -> BtStatus {
        while let Some(child) = self.children.get_mut(self.cursor) {
            match child.tick(sim, ctx) {
                BtStatus::Success => {
                    self.cursor = 0;
                    return BtStatus::Success;
                }
                BtStatus::Failure => self.cursor += 1,
                BtStatus::Running => return BtStatus::Running,
            }
        }
        self.cursor = 0;
        BtStatus::Failure
    }
}

// ============================================================================
// Decorators
// ============================================================================

/// Steps its child every tick and never finishes.
#[derive(Debug)]
pub struct Repeat<N> {
    child: N,
}

impl<N: BtNode> Repeat<N> {
    /// Wrap `child`.
    #[must_use]
    pub const fn new(child: N) -> Self {
        Self { child }
    }
}

impl<N: BtNode> BtNode for Repeat<N> {
    fn tick(&mut self, sim: &mut Simulator, ctx: &mut AiContext) -> BtStatus {
        self.child.tick(sim, ctx);
        BtStatus::Running
    }
}

/// Rests for `ticks` steps after its child finishes.
///
/// While resting it reports [`BtStatus::Running`] without stepping the child.
#[derive(Debug)]
pub struct Cooldown<N> {
    child: N,
    ticks: u32,
    remaining: u32,
}

impl<N: BtNode> Cooldown<N> {
    /// Wrap `child` with a rest of `ticks` steps.
    #[must_use]
    pub const fn new(child: N, ticks: u32) -> Self {
        Self {
            child,
            ticks,
            remaining: 0,
        }
    }

    /// Steps left before the child runs again.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl<N: BtNode> BtNode for Cooldown<N> {
    fn tick(&mut self, sim: &mut Simulator, ctx: &mut AiContext) -> BtStatus {
        if self.remaining > 0 {
            self.remaining -= 1;
            return BtStatus::Running;
        }
        let status = self.child.tick(sim, ctx);
        if status != BtStatus::Running {
            self.remaining = self.ticks;
        }
        status
    }
}

// ============================================================================
// Leaves
// ============================================================================

/// Whether `unit` has anything queued, pending or active besides idling.
fn is_idle(sim: &Simulator, unit: &Unit) -> bool {
    let world = sim.world();
    unit.current_order == OrderType::Idle
        && !unit.has_move_target
        && world.order_queues.get(&unit.id).map_or(true, |q| q.is_empty())
        && !world.pending_commands.iter().any(|c| c.entity == unit.id)
}

/// Whether `unit` is neither fighting nor about to.
fn is_unengaged(sim: &Simulator, unit: &Unit) -> bool {
    let world = sim.world();
    let attacking = unit.current_order == OrderType::Attack
        && unit
            .attack_target
            .and_then(|t| sim.hostile_target_position(unit.faction, t))
            .is_some();
    let queued = world
        .order_queues
        .get(&unit.id)
        .is_some_and(|q| q.iter().any(|o| matches!(o, QueuedOrder::Attack { .. })));
    !attacking && !queued && !world.pending_commands.iter().any(|c| c.entity == unit.id)
}

/// Sends the first unengaged combatant of the faction after the nearest
/// hostile unit within `range` of it. Ties go to the lower id.
#[derive(Debug, Clone, Copy)]
pub struct FindEnemyAndAttack {
    range: i32,
}

impl FindEnemyAndAttack {
    /// Search radius in milli-units.
    #[must_use]
    pub const fn new(range: i32) -> Self {
        Self { range }
    }
}

impl BtNode for FindEnemyAndAttack {
    fn tick(&mut self, sim: &mut Simulator, ctx: &mut AiContext) -> BtStatus {
        let units = &sim.world().units;
        let Some(attacker) = units.iter().find(|u| {
            u.faction == ctx.faction
                && u.hp > 0
                && sim.unit_types().get(u.type_id).is_some_and(|t| t.is_combatant())
                && is_unengaged(sim, u)
        }) else {
            return BtStatus::Failure;
        };
        let limit = i64::from(self.range) * i64::from(self.range);
        let target = units
            .iter()
            .filter(|u| u.faction != ctx.faction && u.hp > 0)
            .map(|u| (distance_squared(attacker.x, attacker.y, u.x, u.y), u.id))
            .filter(|&(d2, _)| d2 <= limit)
            .min();
        let Some((_, target)) = target else {
            return BtStatus::Failure;
        };
        let attacker = attacker.id;
        trace!(faction = ctx.faction.0, attacker = attacker.0, target = target.0, "ai attack");
        sim.issue_attack(attacker, target);
        BtStatus::Success
    }
}

/// Sends the first idle worker of the faction to the nearest non-empty
/// resource node. Ties go to the lower id.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignIdleWorkerToResource;

impl BtNode for AssignIdleWorkerToResource {
    fn tick(&mut self, sim: &mut Simulator, ctx: &mut AiContext) -> BtStatus {
        let world = sim.world();
        let pick = world
            .units
            .iter()
            .filter(|u| {
                u.faction == ctx.faction
                    && u.hp > 0
                    && sim.unit_types().get(u.type_id).is_some_and(|t| t.is_worker)
                    && is_idle(sim, u)
            })
            .find_map(|worker| {
                world
                    .resource_nodes
                    .iter()
                    .filter(|n| n.amount_remaining > 0)
                    .map(|n| (distance_squared(worker.x, worker.y, n.x, n.y), n.id))
                    .min()
                    .map(|(_, node)| (worker.id, node))
            });
        let Some((worker, node)) = pick else {
            return BtStatus::Failure;
        };
        trace!(faction = ctx.faction.0, worker = worker.0, node = node.0, "ai gather");
        sim.issue_gather(worker, node);
        BtStatus::Success
    }
}

// ============================================================================
// Root
// ============================================================================

/// A tree bound to the faction it plays.
#[derive(Debug)]
pub struct RootAi {
    tree: Box<dyn BtNode>,
    ctx: AiContext,
}

impl RootAi {
    /// Bind `tree` to `ctx`.
    #[must_use]
    pub fn new(tree: impl BtNode + 'static, ctx: AiContext) -> Self {
        Self {
            tree: Box::new(tree),
            ctx,
        }
    }

    /// Default opponent: keep workers busy, and every `attack_every` ticks
    /// send one more combatant at an enemy within `range`.
    #[must_use]
    pub fn skirmish(faction: FactionId, seed: u32, range: i32, attack_every: u32) -> Self {
        let tree = Repeat::new(
            Selector::new()
                .with(AssignIdleWorkerToResource)
                .with(Cooldown::new(FindEnemyAndAttack::new(range), attack_every)),
        );
        Self::new(tree, AiContext::new(faction, seed))
    }

    /// Faction this opponent plays.
    #[must_use]
    pub const fn faction(&self) -> FactionId {
        self.ctx.faction
    }

    /// Context, including the opponent's generator.
    #[must_use]
    pub const fn context(&self) -> &AiContext {
        &self.ctx
    }

    /// Step the tree once. Call between simulation ticks.
    pub fn step(&mut self, sim: &mut Simulator) -> BtStatus {
        self.tree.tick(sim, &mut self.ctx)
    }
}
