//! Unit training queues.
//!
//! Each completed building owns one active training slot plus a short
//! pending list. Costs are paid when an item is queued and refunded when
//! it is cancelled. Population headroom is checked at enqueue and again at
//! completion; a completion without headroom is skipped and not refunded.

use tracing::{debug, trace};

use crate::components::{EntityId, OrderType, TrainingSlot, UnitTypeId};
use crate::data::DEFAULT_TRAIN_TIME_MS;
use crate::error::{GameError, Result};
use crate::math::TILE_SIZE;
use crate::simulation::{Simulator, MS_PER_TICK};

/// Most items a building holds, counting the active slot.
pub const MAX_PRODUCTION_QUEUE: usize = 5;

/// Trained units appear up to this far from the footprint's lower edge.
pub const SPAWN_SCATTER: i32 = 2000;

impl Simulator {
    /// Queue a unit for training.
    ///
    /// Fails without mutation if the building is missing or still under
    /// construction, the type is unknown, the queue is full, or the owning
    /// faction cannot pay or house the unit.
    pub fn enqueue_train(&mut self, building: EntityId, unit_type: UnitTypeId) -> Result<()> {
        let index = self
            .world
            .building_index(building)
            .ok_or(GameError::EntityNotFound(building))?;
        let site = &self.world.buildings[index];
        if site.under_construction {
            return Err(GameError::UnderConstruction(building));
        }
        let data = self
            .unit_types
            .get(unit_type)
            .ok_or(GameError::UnknownUnitType(unit_type))?;
        if site.queued_count() >= MAX_PRODUCTION_QUEUE {
            return Err(GameError::ProductionQueueFull(building));
        }
        let faction = &self.world.factions[site.faction.index()];
        faction.resources.check_afford(&data.cost)?;
        faction.check_pop_headroom(data.pop_cost)?;

        let (cost, train_ms, owner) = (data.cost, data.effective_train_time_ms(), site.faction);
        self.world.factions[owner.index()].resources.deduct(&cost);
        let site = &mut self.world.buildings[index];
        if site.training.is_none() {
            site.training = Some(TrainingSlot {
                unit_type,
                remaining_ms: train_ms,
                total_ms: train_ms,
            });
        } else {
            site.pending.push(unit_type);
        }
        trace!(%building, %unit_type, queued = site.queued_count(), "training queued");
        Ok(())
    }

    /// Cancel the active training slot and refund its cost.
    ///
    /// The next pending item, already paid for, moves into the slot.
    pub fn cancel_production(&mut self, building: EntityId) -> Result<()> {
        let index = self
            .world
            .building_index(building)
            .ok_or(GameError::EntityNotFound(building))?;
        let site = &mut self.world.buildings[index];
        let slot = site.training.take().ok_or(GameError::NothingQueued(building))?;
        let owner = site.faction;
        self.start_next_pending(index);
        let refund = self.unit_types.get(slot.unit_type).map(|t| t.cost).unwrap_or_default();
        self.world.factions[owner.index()].resources.add(&refund);
        trace!(%building, unit_type = %slot.unit_type, "training cancelled");
        Ok(())
    }

    /// Send units trained by a building to `(x, y)`.
    pub fn set_rally_point(&mut self, building: EntityId, x: i32, y: i32) -> Result<()> {
        let index = self
            .world
            .building_index(building)
            .ok_or(GameError::EntityNotFound(building))?;
        let point = self.clamp_to_map(x, y);
        self.world.buildings[index].rally_point = Some(point);
        Ok(())
    }

    /// Let trained units stay where they spawn.
    pub fn clear_rally_point(&mut self, building: EntityId) -> Result<()> {
        let index = self
            .world
            .building_index(building)
            .ok_or(GameError::EntityNotFound(building))?;
        self.world.buildings[index].rally_point = None;
        Ok(())
    }

    fn start_next_pending(&mut self, index: usize) {
        let site = &mut self.world.buildings[index];
        if site.training.is_some() || site.pending.is_empty() {
            return;
        }
        let unit_type = site.pending.remove(0);
        let train_ms = self
            .unit_types
            .get(unit_type)
            .map_or(DEFAULT_TRAIN_TIME_MS, |t| t.effective_train_time_ms());
        site.training = Some(TrainingSlot {
            unit_type,
            remaining_ms: train_ms,
            total_ms: train_ms,
        });
    }

    /// Advance every training slot by one tick and spawn finished units.
    pub(crate) fn training_step(&mut self) {
        for index in 0..self.world.buildings.len() {
            if self.world.buildings[index].under_construction {
                continue;
            }
            self.start_next_pending(index);
            let site = &mut self.world.buildings[index];
            let Some(slot) = site.training.as_mut() else {
                continue;
            };
            slot.remaining_ms -= MS_PER_TICK;
            if slot.remaining_ms > 0 {
                continue;
            }
            let unit_type = slot.unit_type;
            site.training = None;
            self.complete_training(index, unit_type);
            self.start_next_pending(index);
        }
    }

    fn complete_training(&mut self, index: usize, unit_type: UnitTypeId) {
        let site = &self.world.buildings[index];
        let (building, faction, rally) = (site.id, site.faction, site.rally_point);
        let Some(data) = self.unit_types.get(unit_type) else {
            return;
        };
        let (max_hp, pop_cost) = (data.max_hp.max(1), data.pop_cost);
        if !self.world.factions[faction.index()].has_pop_headroom(pop_cost) {
            debug!(%building, %unit_type, "training finished without population room");
            return;
        }

        let (cx, _) = site.center();
        let below = site.y + site.footprint_h * TILE_SIZE;
        let x = cx + self.world.rng.range(-SPAWN_SCATTER / 2, SPAWN_SCATTER / 2);
        let y = below + self.world.rng.range(0, SPAWN_SCATTER / 2);
        let unit = self.spawn_unit_unchecked(unit_type, faction, x, y, max_hp, pop_cost);

        if let Some((rx, ry)) = rally {
            if let Some(unit_index) = self.world.unit_index(unit) {
                self.world.units[unit_index].current_order = OrderType::Move;
                self.plan_move(unit_index, rx, ry);
            }
        }
        trace!(%building, %unit, "unit trained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::BuildingTypeId;
    use crate::config::SimConfig;
    use crate::data::{BuildingData, ContentRegistry, UnitData};
    use crate::factions::{FactionId, ResourceStock};

    fn setup() -> (Simulator, EntityId, UnitTypeId) {
        let content = ContentRegistry {
            units: vec![UnitData {
                id: "militia".to_string(),
                speed: 3000,
                max_hp: 40,
                pop_cost: 1,
                cost: ResourceStock::new(50, 0, 0, 0),
                train_time_ms: 500,
                ..UnitData::default()
            }],
            buildings: vec![BuildingData {
                id: "barracks".to_string(),
                footprint_w: 3,
                footprint_h: 3,
                ..BuildingData::default()
            }],
            ..ContentRegistry::default()
        };
        let mut sim = Simulator::with_content(
            SimConfig {
                map_width: 32,
                map_height: 32,
                ..SimConfig::default()
            },
            content,
        );
        sim.set_faction_resources(FactionId(0), ResourceStock::new(1000, 0, 0, 0))
            .unwrap();
        sim.set_faction_pop_cap(FactionId(0), 10).unwrap();
        let barracks = sim
            .spawn_building(BuildingTypeId(0), FactionId(0), 5000, 5000)
            .unwrap();
        (sim, barracks, UnitTypeId(0))
    }

    #[test]
    fn test_train_pays_up_front_and_spawns_below() {
        let (mut sim, barracks, militia) = setup();
        sim.enqueue_train(barracks, militia).unwrap();
        assert_eq!(sim.faction(FactionId(0)).unwrap().resources.food, 950);
        sim.run_ticks(9);
        assert!(sim.world().units.is_empty());
        sim.tick();
        assert_eq!(sim.world().units.len(), 1);
        let unit = &sim.world().units[0];
        assert!(unit.y >= 8000 && unit.y < 9000);
        assert!(unit.x >= 5500 && unit.x < 7500);
        assert_eq!(unit.hp, 40);
        assert_eq!(sim.faction(FactionId(0)).unwrap().pop, 1);
    }

    #[test]
    fn test_queue_drains_in_order_and_caps() {
        let (mut sim, barracks, militia) = setup();
        for _ in 0..MAX_PRODUCTION_QUEUE {
            sim.enqueue_train(barracks, militia).unwrap();
        }
        let before = sim.faction(FactionId(0)).unwrap().clone();
        assert!(matches!(
            sim.enqueue_train(barracks, militia),
            Err(GameError::ProductionQueueFull(_))
        ));
        assert_eq!(sim.faction(FactionId(0)).unwrap(), &before);
        sim.run_ticks(50);
        assert_eq!(sim.world().units.len(), MAX_PRODUCTION_QUEUE);
        assert_eq!(sim.world().building(barracks).unwrap().queued_count(), 0);
    }

    #[test]
    fn test_cancel_refunds_active_slot() {
        let (mut sim, barracks, militia) = setup();
        sim.enqueue_train(barracks, militia).unwrap();
        sim.enqueue_train(barracks, militia).unwrap();
        sim.run_ticks(3);
        sim.cancel_production(barracks).unwrap();
        assert_eq!(sim.faction(FactionId(0)).unwrap().resources.food, 950);
        let slot = sim.world().building(barracks).unwrap().training.unwrap();
        assert_eq!(slot.remaining_ms, 500);
        sim.cancel_production(barracks).unwrap();
        assert!(matches!(
            sim.cancel_production(barracks),
            Err(GameError::NothingQueued(_))
        ));
        assert_eq!(sim.faction(FactionId(0)).unwrap().resources.food, 1000);
    }

    #[test]
    fn test_pop_cap_blocks_enqueue_and_completion() {
        let (mut sim, barracks, militia) = setup();
        sim.set_faction_pop_cap(FactionId(0), 1).unwrap();
        sim.enqueue_train(barracks, militia).unwrap();
        sim.spawn_unit(militia, FactionId(0), 1000, 1000, 0).unwrap();
        assert!(matches!(
            sim.enqueue_train(barracks, militia),
            Err(GameError::PopulationCapReached { .. })
        ));
        sim.run_ticks(20);
        assert_eq!(sim.world().units.len(), 1);
        assert_eq!(sim.faction(FactionId(0)).unwrap().pop, 1);
        assert_eq!(sim.faction(FactionId(0)).unwrap().resources.food, 950);
    }

    #[test]
    fn test_rally_point_issues_move() {
        let (mut sim, barracks, militia) = setup();
        sim.set_rally_point(barracks, 20_000, 20_000).unwrap();
        sim.enqueue_train(barracks, militia).unwrap();
        sim.run_ticks(10);
        let unit = &sim.world().units[0];
        assert_eq!(unit.current_order, OrderType::Move);
        assert_eq!((unit.target_x, unit.target_y), (20_000, 20_000));
        sim.clear_rally_point(barracks).unwrap();
        assert!(sim.world().building(barracks).unwrap().rally_point.is_none());
    }

    #[test]
    fn test_rejections_are_atomic() {
        let (mut sim, barracks, militia) = setup();
        sim.set_faction_resources(FactionId(0), ResourceStock::new(49, 0, 0, 0))
            .unwrap();
        let before = sim.world().compute_hash(sim.unit_types().version());
        assert!(matches!(
            sim.enqueue_train(barracks, militia),
            Err(GameError::InsufficientResources { .. })
        ));
        assert!(matches!(
            sim.enqueue_train(barracks, UnitTypeId(4)),
            Err(GameError::UnknownUnitType(_))
        ));
        assert!(matches!(
            sim.enqueue_train(EntityId(999), militia),
            Err(GameError::EntityNotFound(_))
        ));
        assert_eq!(sim.world().compute_hash(sim.unit_types().version()), before);
    }
}
