//! Gathering, deposit and idle-worker auto-assignment.
//!
//! Gather progress is kept in `ms * rate` where rates are thousandths of a
//! resource per second, so [`GATHER_PROGRESS_PER_UNIT`] of progress equals
//! one resource. Resources only move from a node into a unit's cargo and
//! from cargo into a faction stockpile; nothing is created along the way.
//! Exhausted nodes stay in the world with zero remaining.

use tracing::trace;

use crate::components::OrderType;
use crate::events::SimEventKind;
use crate::factions::{FactionId, ResourceKind};
use crate::math::{distance_squared, TILE_SIZE};
use crate::simulation::{Simulator, MS_PER_TICK};

/// Workers harvest from a node within this distance.
pub const GATHER_RANGE: i32 = 1400;

/// Base drop-off distance, extended by half the depot's larger side.
pub const DEPOSIT_RANGE: i32 = 1600;

/// Progress that converts into one unit of resource.
pub const GATHER_PROGRESS_PER_UNIT: i32 = 1_000_000;

impl Simulator {
    /// Run the gather state machine of every gathering unit, in array order.
    pub(crate) fn gather_step(&mut self) {
        for index in 0..self.world.units.len() {
            let unit = &self.world.units[index];
            if unit.current_order != OrderType::Gather || unit.hp <= 0 {
                continue;
            }
            if unit.returning_with_cargo {
                self.return_cargo(index);
            } else {
                self.harvest(index);
            }
        }
    }

    fn harvest(&mut self, index: usize) {
        let unit = &self.world.units[index];
        let Some(node_index) = unit.order_target.and_then(|n| self.world.node_index(n)) else {
            self.stop_gathering(index);
            return;
        };
        let node = &self.world.resource_nodes[node_index];
        let (kind, node_x, node_y) = (node.kind, node.x, node.y);

        if node.amount_remaining <= 0 {
            if unit.carry_amount > 0 {
                self.world.units[index].returning_with_cargo = true;
            } else {
                self.stop_gathering(index);
            }
            return;
        }
        if unit.carry_amount > 0 && unit.carry_kind != kind {
            self.world.units[index].returning_with_cargo = true;
            return;
        }

        let Some(gather) = self
            .unit_types
            .get(unit.type_id)
            .filter(|t| t.is_worker)
            .map(|t| t.gather)
        else {
            self.stop_gathering(index);
            return;
        };
        let rate = gather.rate_for(kind);
        if rate <= 0 {
            self.stop_gathering(index);
            return;
        }
        let capacity = gather.carry_capacity.max(1);
        if unit.carry_amount >= capacity {
            self.world.units[index].returning_with_cargo = true;
            return;
        }

        let range = i64::from(GATHER_RANGE);
        if distance_squared(unit.x, unit.y, node_x, node_y) > range * range {
            if !unit.has_move_target {
                self.plan_move(index, node_x, node_y);
            }
            return;
        }
        if unit.has_move_target {
            self.halt(index);
        }

        let unit = &mut self.world.units[index];
        let node = &mut self.world.resource_nodes[node_index];
        unit.carry_kind = kind;
        unit.gather_progress = unit.gather_progress.saturating_add(MS_PER_TICK.saturating_mul(rate));
        while unit.gather_progress >= GATHER_PROGRESS_PER_UNIT
            && node.amount_remaining > 0
            && unit.carry_amount < capacity
        {
            unit.gather_progress -= GATHER_PROGRESS_PER_UNIT;
            unit.carry_amount += 1;
            node.amount_remaining -= 1;
        }
        if unit.carry_amount >= capacity || (node.amount_remaining == 0 && unit.carry_amount > 0) {
            unit.returning_with_cargo = true;
        }
    }

    fn return_cargo(&mut self, index: usize) {
        let unit = &self.world.units[index];
        if unit.carry_amount <= 0 {
            self.world.units[index].returning_with_cargo = false;
            return;
        }
        let Some((cx, cy, reach)) = self.nearest_depot(unit.faction, unit.carry_kind, unit.x, unit.y) else {
            return;
        };

        let limit = i64::from(DEPOSIT_RANGE) + i64::from(reach);
        if distance_squared(unit.x, unit.y, cx, cy) > limit * limit {
            let heading = unit.has_move_target && unit.target_x == cx && unit.target_y == cy;
            if !heading {
                self.plan_move(index, cx, cy);
            }
            return;
        }

        let unit = &mut self.world.units[index];
        let (id, faction, kind, amount) = (unit.id, unit.faction, unit.carry_kind, unit.carry_amount);
        unit.carry_amount = 0;
        unit.gather_progress = 0;
        unit.returning_with_cargo = false;
        let node = unit.order_target;
        self.halt(index);

        *self.world.factions[faction.index()].resources.get_mut(kind) += amount;
        self.events.push(
            self.world.tick,
            SimEventKind::ResourceCollected {
                unit: id,
                kind,
                amount,
                faction,
            },
        );
        trace!(%id, %kind, amount, "cargo deposited");

        let depleted = node
            .and_then(|n| self.world.resource_node(n))
            .map_or(true, |n| n.amount_remaining <= 0);
        if depleted {
            self.stop_gathering(index);
        }
    }

    /// Center and reach of the closest completed drop-off for `kind`.
    fn nearest_depot(&self, faction: FactionId, kind: ResourceKind, x: i32, y: i32) -> Option<(i32, i32, i32)> {
        self.world
            .buildings
            .iter()
            .filter(|b| b.faction == faction && !b.under_construction)
            .filter(|b| self.content.building(b.type_id).map_or(true, |data| data.accepts(kind)))
            .map(|b| {
                let (cx, cy) = b.center();
                (distance_squared(x, y, cx, cy), b.id, cx, cy, b.footprint_w.max(b.footprint_h))
            })
            .min_by_key(|&(d2, id, ..)| (d2, id))
            .map(|(_, _, cx, cy, side)| (cx, cy, side * TILE_SIZE / 2))
    }

    fn stop_gathering(&mut self, index: usize) {
        let unit = &mut self.world.units[index];
        unit.current_order = OrderType::Idle;
        unit.order_target = None;
        unit.gather_progress = 0;
        unit.returning_with_cargo = false;
        if unit.has_move_target {
            self.halt(index);
        }
    }

    /// Send every idle worker to the nearest node with resources left.
    pub(crate) fn auto_assign_idle_workers(&mut self) {
        for index in 0..self.world.units.len() {
            let unit = &self.world.units[index];
            let idle = unit.is_idle() && !unit.returning_with_cargo && unit.hp > 0;
            if !idle || self.world.order_queues.contains_key(&unit.id) {
                continue;
            }
            if !self.unit_types.get(unit.type_id).is_some_and(|t| t.is_worker) {
                continue;
            }
            let nearest = self
                .world
                .resource_nodes
                .iter()
                .filter(|n| n.amount_remaining > 0)
                .min_by_key(|n| (distance_squared(unit.x, unit.y, n.x, n.y), n.id))
                .map(|n| n.id);
            if let Some(node) = nearest {
                let unit = &mut self.world.units[index];
                unit.current_order = OrderType::Gather;
                unit.order_target = Some(node);
                trace!(unit = %unit.id, %node, "auto-assigned worker");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BuildingTypeId, EntityId, UnitTypeId};
    use crate::config::SimConfig;
    use crate::data::{BuildingData, ContentRegistry, GatherStats, UnitData};

    fn content() -> ContentRegistry {
        ContentRegistry {
            buildings: vec![
                BuildingData {
                    id: "town_center".to_string(),
                    max_hp: 2000,
                    footprint_w: 2,
                    footprint_h: 2,
                    ..BuildingData::default()
                },
                BuildingData {
                    id: "lumber_camp".to_string(),
                    max_hp: 600,
                    footprint_w: 2,
                    footprint_h: 2,
                    accepts_deposit: vec![ResourceKind::Wood],
                    ..BuildingData::default()
                },
            ],
            ..ContentRegistry::default()
        }
    }

    fn setup() -> (Simulator, UnitTypeId) {
        let mut sim = Simulator::with_content(
            SimConfig {
                map_width: 32,
                map_height: 32,
                ..SimConfig::default()
            },
            content(),
        );
        let worker = sim
            .register_unit_type(UnitData {
                id: "worker".to_string(),
                speed: 2500,
                max_hp: 50,
                is_worker: true,
                gather: GatherStats {
                    average_rate: 2000,
                    carry_capacity: 10,
                    ..GatherStats::default()
                },
                pop_cost: 1,
                ..UnitData::default()
            })
            .unwrap();
        (sim, worker)
    }

    fn collected(sim: &mut Simulator) -> Vec<(ResourceKind, i32)> {
        sim.drain_events()
            .into_iter()
            .filter_map(|e| match e.kind {
                SimEventKind::ResourceCollected { kind, amount, .. } => Some((kind, amount)),
                _ => None,
            })
            .collect()
    }

    fn carried(sim: &Simulator, id: EntityId) -> i32 {
        sim.world().unit(id).map_or(0, |u| u.carry_amount)
    }

    #[test]
    fn test_gather_cycle_conserves_resources() {
        let (mut sim, worker) = setup();
        sim.spawn_building(BuildingTypeId(0), FactionId(0), 1000, 1000).unwrap();
        let id = sim.spawn_unit(worker, FactionId(0), 3000, 3000, 0).unwrap();
        let node = sim.spawn_resource_node(ResourceKind::Food, 6000, 3000, 50);
        sim.issue_gather(id, node);

        for _ in 0..300 {
            sim.tick();
            let food = sim.faction(FactionId(0)).unwrap().resources.food;
            let remaining = sim.world().resource_node(node).unwrap().amount_remaining;
            assert!(remaining >= 0);
            assert_eq!(food + carried(&sim, id), 50 - remaining);
        }
        let deposits = collected(&mut sim);
        assert!(deposits.len() >= 2);
        assert!(deposits.iter().all(|&(kind, amount)| kind == ResourceKind::Food && amount == 10));
    }

    #[test]
    fn test_exhausted_node_clears_order_after_deposit() {
        let (mut sim, worker) = setup();
        sim.spawn_building(BuildingTypeId(0), FactionId(0), 1000, 1000).unwrap();
        let id = sim.spawn_unit(worker, FactionId(0), 3000, 3000, 0).unwrap();
        let node = sim.spawn_resource_node(ResourceKind::Wood, 3500, 3000, 3);
        sim.issue_gather(id, node);
        sim.run_ticks(80);

        let unit = sim.world().unit(id).unwrap();
        assert_eq!(unit.current_order, OrderType::Idle);
        assert_eq!(unit.carry_amount, 0);
        assert_eq!(sim.faction(FactionId(0)).unwrap().resources.wood, 3);
        assert_eq!(sim.world().resource_node(node).unwrap().amount_remaining, 0);
        assert_eq!(collected(&mut sim), vec![(ResourceKind::Wood, 3)]);
    }

    #[test]
    fn test_deposit_skips_buildings_that_refuse_the_resource() {
        let (mut sim, worker) = setup();
        sim.spawn_building(BuildingTypeId(1), FactionId(0), 6000, 6000).unwrap();
        sim.spawn_building(BuildingTypeId(0), FactionId(0), 20_000, 6000).unwrap();
        let id = sim.spawn_unit(worker, FactionId(0), 8000, 9000, 0).unwrap();
        let node = sim.spawn_resource_node(ResourceKind::Food, 8000, 9500, 500);
        sim.issue_gather(id, node);
        sim.run_ticks(106);
        assert!(sim.world().unit(id).unwrap().returning_with_cargo);
        let target_x = sim.world().unit(id).unwrap().target_x;
        assert_eq!(target_x, 21_000);
    }

    #[test]
    fn test_no_depot_keeps_cargo() {
        let (mut sim, worker) = setup();
        let id = sim.spawn_unit(worker, FactionId(0), 3000, 3000, 0).unwrap();
        let node = sim.spawn_resource_node(ResourceKind::Stone, 3500, 3000, 500);
        sim.issue_gather(id, node);
        sim.run_ticks(200);
        let unit = sim.world().unit(id).unwrap();
        assert!(unit.returning_with_cargo);
        assert_eq!(unit.carry_amount, 10);
        assert_eq!(sim.world().resource_node(node).unwrap().amount_remaining, 490);
    }

    #[test]
    fn test_non_worker_gather_goes_idle() {
        let (mut sim, _) = setup();
        let scout = sim
            .register_unit_type(UnitData {
                speed: 3000,
                max_hp: 10,
                ..UnitData::default()
            })
            .unwrap();
        let id = sim.spawn_unit(scout, FactionId(0), 3000, 3000, 0).unwrap();
        let node = sim.spawn_resource_node(ResourceKind::Food, 9000, 3000, 100);
        sim.issue_gather(id, node);
        sim.tick();
        let unit = sim.world().unit(id).unwrap();
        assert_eq!(unit.current_order, OrderType::Idle);
        assert!(!unit.has_move_target);
    }

    #[test]
    fn test_auto_assign_picks_nearest_non_empty_node() {
        let (mut sim, worker) = setup();
        sim.set_auto_assign_workers(true);
        let id = sim.spawn_unit(worker, FactionId(0), 3000, 3000, 0).unwrap();
        sim.spawn_resource_node(ResourceKind::Food, 3200, 3000, 0);
        let far = sim.spawn_resource_node(ResourceKind::Wood, 9000, 3000, 100);
        sim.spawn_resource_node(ResourceKind::Stone, 15_000, 3000, 100);
        sim.tick();
        let unit = sim.world().unit(id).unwrap();
        assert_eq!(unit.current_order, OrderType::Gather);
        assert_eq!(unit.order_target, Some(far));
    }
}
