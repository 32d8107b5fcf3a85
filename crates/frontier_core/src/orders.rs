//! Command intake and per-unit order queues.
//!
//! Commands wait in the world's pending queue until their issue tick. When
//! drained they are validated against spawn ticks and turned into
//! [`QueuedOrder`]s appended to the acting unit's FIFO. A unit activates the
//! head of its FIFO only while idle.

use std::collections::VecDeque;

use tracing::trace;

use crate::components::{Command, CommandKind, EntityId, OrderType, QueuedOrder};
use crate::math::to_tile;
use crate::pathfinding::smooth_path;
use crate::simulation::Simulator;
use crate::world::{MAX_PATH_WAYPOINTS, MAX_QUEUED_ORDERS};

impl Simulator {
    /// Submit a command. It executes on the first tick `>= issue_tick`.
    pub fn enqueue_command(&mut self, command: Command) {
        self.journal_command(command);
        self.world.pending_commands.push_back(command);
    }

    /// Queue a move for the next tick.
    pub fn issue_move(&mut self, unit: EntityId, x: i32, y: i32) {
        let cmd = Command::at_point(self.world.tick, CommandKind::Move, unit, x, y);
        self.enqueue_command(cmd);
    }

    /// Queue an attack on a unit or building for the next tick.
    pub fn issue_attack(&mut self, unit: EntityId, target: EntityId) {
        let cmd = Command::at_entity(self.world.tick, CommandKind::Attack, unit, target);
        self.enqueue_command(cmd);
    }

    /// Queue gathering from a resource node for the next tick.
    pub fn issue_gather(&mut self, unit: EntityId, node: EntityId) {
        let cmd = Command::at_entity(self.world.tick, CommandKind::Gather, unit, node);
        self.enqueue_command(cmd);
    }

    /// Queue an attack-move for the next tick.
    pub fn issue_attack_move(&mut self, unit: EntityId, x: i32, y: i32) {
        let cmd = Command::at_point(self.world.tick, CommandKind::AttackMove, unit, x, y);
        self.enqueue_command(cmd);
    }

    /// Queue a stop for the next tick.
    pub fn issue_stop(&mut self, unit: EntityId) {
        let cmd = Command::at_point(self.world.tick, CommandKind::Stop, unit, 0, 0);
        self.enqueue_command(cmd);
    }

    /// Submit a command that becomes ready at `execute_tick`.
    ///
    /// This is the entry point for lockstep-distributed input. For
    /// [`CommandKind::Attack`] and [`CommandKind::Gather`], `x` carries the
    /// target entity id.
    pub fn schedule_command(&mut self, kind: CommandKind, entity: EntityId, x: i32, y: i32, execute_tick: u64) {
        self.enqueue_command(Command::at_point(execute_tick, kind, entity, x, y));
    }

    /// Move every ready command into its unit's order queue, keeping the rest.
    pub(crate) fn drain_ready_commands(&mut self) {
        let tick = self.world.tick;
        let pending = std::mem::take(&mut self.world.pending_commands);
        let mut retained = VecDeque::with_capacity(pending.len());
        for cmd in pending {
            if cmd.is_ready(tick) {
                self.apply_command(cmd);
            } else {
                retained.push_back(cmd);
            }
        }
        self.world.pending_commands = retained;
    }

    fn apply_command(&mut self, cmd: Command) {
        let tick = self.world.tick;
        let spawned = self.world.spawn_tick(cmd.entity).is_some_and(|t| t <= tick);
        let Some(index) = self.world.unit_index(cmd.entity).filter(|_| spawned) else {
            trace!(entity = %cmd.entity, tick, "dropping command for missing unit");
            return;
        };

        let order = match cmd.kind {
            CommandKind::Stop => {
                self.stop_unit(index);
                return;
            }
            CommandKind::Move => QueuedOrder::Move {
                x: cmd.target_x,
                y: cmd.target_y,
            },
            CommandKind::AttackMove => QueuedOrder::AttackMove {
                x: cmd.target_x,
                y: cmd.target_y,
            },
            CommandKind::Attack | CommandKind::Gather => {
                let target = cmd.target_entity();
                let target_spawned = self.world.spawn_tick(target).is_some_and(|t| t <= tick);
                let valid_kind = if cmd.kind == CommandKind::Attack {
                    self.world.unit_index(target).is_some() || self.world.building_index(target).is_some()
                } else {
                    self.world.node_index(target).is_some()
                };
                if !target_spawned || !valid_kind {
                    trace!(entity = %cmd.entity, target = %target, tick, "dropping command for invalid target");
                    return;
                }
                if cmd.kind == CommandKind::Attack {
                    QueuedOrder::Attack { target }
                } else {
                    QueuedOrder::Gather { node: target }
                }
            }
        };

        let queue = self.world.order_queues.entry(cmd.entity).or_default();
        if queue.len() >= MAX_QUEUED_ORDERS {
            trace!(entity = %cmd.entity, "order queue full");
            return;
        }
        queue.push_back(order);
    }

    /// Activate the head order of every idle unit, in id order.
    pub(crate) fn promote_queued_orders(&mut self) {
        let ids: Vec<EntityId> = self.world.order_queues.keys().copied().collect();
        for id in ids {
            let Some(index) = self.world.unit_index(id) else {
                self.world.order_queues.remove(&id);
                continue;
            };
            if !self.world.units[index].is_idle() {
                continue;
            }
            let Some(queue) = self.world.order_queues.get_mut(&id) else {
                continue;
            };
            let next = queue.pop_front();
            if queue.is_empty() {
                self.world.order_queues.remove(&id);
            }
            if let Some(order) = next {
                self.activate_order(index, order);
            }
        }
    }

    fn activate_order(&mut self, index: usize, order: QueuedOrder) {
        let unit = &mut self.world.units[index];
        match order {
            QueuedOrder::Move { x, y } => {
                unit.current_order = OrderType::Move;
                unit.order_target = None;
                unit.attack_target = None;
                self.plan_move(index, x, y);
            }
            QueuedOrder::AttackMove { x, y } => {
                unit.current_order = OrderType::AttackMove;
                unit.order_target = None;
                unit.attack_target = None;
                self.plan_move(index, x, y);
            }
            QueuedOrder::Attack { target } => {
                unit.current_order = OrderType::Attack;
                unit.order_target = Some(target);
                unit.attack_target = Some(target);
            }
            QueuedOrder::Gather { node } => {
                unit.current_order = OrderType::Gather;
                unit.order_target = Some(node);
                unit.attack_target = None;
            }
        }
    }

    /// Drop every queued and active order of a unit.
    ///
    /// A windup that has not committed is cancelled; a committed impact
    /// still lands.
    pub(crate) fn stop_unit(&mut self, index: usize) {
        let unit = &mut self.world.units[index];
        let id = unit.id;
        unit.current_order = OrderType::Idle;
        unit.order_target = None;
        unit.attack_target = None;
        unit.has_move_target = false;
        unit.target_x = unit.x;
        unit.target_y = unit.y;
        unit.returning_with_cargo = false;
        if unit.impact_remaining_ms == 0 {
            unit.attack_windup_remaining_ms = 0;
            unit.pending_attack_target = None;
        }
        self.world.order_queues.remove(&id);
        self.world.paths.remove(&id);
    }

    /// Point a unit at a destination and plan its waypoints.
    ///
    /// The destination is clamped to the map. Waypoints are the interior
    /// tiles of the smoothed A* route; the final leg always heads for the
    /// exact destination. An unreachable goal leaves the unit walking
    /// straight.
    pub(crate) fn plan_move(&mut self, index: usize, x: i32, y: i32) {
        let (x, y) = self.clamp_to_map(x, y);
        let unit = &mut self.world.units[index];
        unit.set_move_target(x, y);
        let id = unit.id;
        let start = (to_tile(unit.x), to_tile(unit.y));
        let goal = (to_tile(x), to_tile(y));

        let waypoints: VecDeque<(i32, i32)> = if start == goal {
            VecDeque::new()
        } else {
            self.pathfinder
                .find_path(&self.nav, start, goal)
                .map(|tiles| {
                    let smoothed = smooth_path(&self.nav, tiles);
                    let interior = smoothed.len().saturating_sub(2);
                    smoothed
                        .into_iter()
                        .skip(1)
                        .take(interior.min(MAX_PATH_WAYPOINTS))
                        .collect()
                })
                .unwrap_or_default()
        };

        if waypoints.is_empty() {
            self.world.paths.remove(&id);
        } else {
            self.world.paths.insert(id, waypoints);
        }
    }

    /// Stop walking without touching the active order.
    pub(crate) fn halt(&mut self, index: usize) {
        let unit = &mut self.world.units[index];
        unit.has_move_target = false;
        unit.target_x = unit.x;
        unit.target_y = unit.y;
        let id = unit.id;
        self.world.paths.remove(&id);
    }
}
