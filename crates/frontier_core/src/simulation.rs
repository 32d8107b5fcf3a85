//! Core simulation loop.
//!
//! The simulation runs at a fixed tick rate and processes all game logic
//! deterministically. [`Simulator`] owns the world state and every
//! auxiliary structure (navigation grid, flow field, event buffers, hash
//! history, replay and rollback buffers). Subsystems are implemented as
//! `impl Simulator` blocks in their own modules and run from [`Simulator::tick`]
//! in a fixed order.
//!
//! # Determinism
//!
//! - No floating-point math on any path that feeds the tick hash
//! - One seeded RNG owned by the world state
//! - Dense arrays iterated by index, side tables iterated in id order
//! - Same inputs always produce the same hash sequence
//!
//! # Example
//!
//! ```
//! use frontier_core::config::SimConfig;
//! use frontier_core::data::UnitData;
//! use frontier_core::factions::FactionId;
//! use frontier_core::simulation::Simulator;
//!
//! let mut sim = Simulator::new(SimConfig::default());
//! let scout = sim
//!     .register_unit_type(UnitData { speed: 4000, max_hp: 30, ..UnitData::default() })
//!     .unwrap();
//! let unit = sim.spawn_unit(scout, FactionId(0), 1000, 1000, 0).unwrap();
//! sim.issue_move(unit, 1000, 3000);
//! for _ in 0..20 {
//!     sim.tick();
//! }
//! assert_eq!(sim.world().unit(unit).map(|u| u.y), Some(3000));
//! ```

use tracing::{debug, trace};

use crate::components::{Building, BuildingTypeId, EntityId, ResourceNode, Unit, UnitTypeId};
use crate::config::SimConfig;
use crate::data::{ContentRegistry, UnitData};
use crate::error::{GameError, Result};
use crate::events::{DamageEvent, EventLog, SimEvent, SimEventKind};
use crate::factions::{Faction, FactionId, ResourceKind, ResourceStock, MAX_FACTIONS};
use crate::flow_field::FlowField;
use crate::hash::HashRing;
use crate::math::{to_tile, TILE_SIZE};
use crate::pathfinding::{NavGrid, Pathfinder};
use crate::replay::ReplayTimeline;
use crate::rollback::RollbackBuffer;
use crate::spatial::SpatialGrid;
use crate::unit_types::UnitTypeTable;
use crate::world::{FogGrid, WorldState};

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in milliseconds.
pub const MS_PER_TICK: i32 = 1000 / TICK_RATE as i32;

/// The deterministic simulator.
///
/// This struct owns all game state and provides methods to advance the
/// simulation deterministically. The only ways to mutate state are the
/// spawn/destroy APIs, the command API and [`tick`](Self::tick).
///
/// # System Execution Order
///
/// Each tick, after incrementing the tick counter:
/// 1. **Spatial grid** - re-bucket unit positions
/// 2. **Flow field** - rebuild if active and dirty
/// 3. **Playback** - inject journaled commands due this tick
/// 4. **Commands** - drain ready commands into order queues
/// 5. **Orders** - promote the next queued order of idle units
/// 6. **Movement** - chase, waypoints, steering
/// 7. **Vision** - recompute visibility for the local faction
/// 8. **Production** - construction, then training
/// 9. **Research**
/// 10. **Combat** - projectiles, attacks, deferred deaths
/// 11. **Gathering** - harvest and deposit
/// 12. **Auto-assign** - idle workers, when enabled
/// 13. **Hash** - fold the world into the tick hash
/// 14. **Replay** - record a frame
/// 15. **Rollback** - record a snapshot when due
#[derive(Debug, Clone)]
pub struct Simulator {
    pub(crate) world: WorldState,
    pub(crate) unit_types: UnitTypeTable,
    pub(crate) content: ContentRegistry,
    pub(crate) config: SimConfig,
    pub(crate) nav: NavGrid,
    pub(crate) pathfinder: Pathfinder,
    pub(crate) flow_field: FlowField,
    pub(crate) spatial: SpatialGrid,
    pub(crate) events: EventLog,
    pub(crate) hashes: HashRing,
    pub(crate) last_tick_hash: u64,
    pub(crate) visibility_changes: Vec<(i32, i32)>,
    pub(crate) timeline: ReplayTimeline,
    pub(crate) replay_recording: bool,
    pub(crate) playback_cursor: usize,
    pub(crate) rollback: Option<RollbackBuffer>,
    pub(crate) resimulating: bool,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Simulator {
    /// Create an empty simulator at tick 0.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self::with_content(config, ContentRegistry::default())
    }

    /// Create a simulator and register every unit type of `content` in order.
    #[must_use]
    pub fn with_content(config: SimConfig, content: ContentRegistry) -> Self {
        let (width, height) = config.clamped_map_size();
        let mut unit_types = UnitTypeTable::new();
        for data in &content.units {
            if unit_types.register(data.clone()).is_none() {
                break;
            }
        }
        let mut sim = Self {
            world: WorldState::new(width, height, config.seed),
            unit_types,
            content,
            nav: NavGrid::new(width, height),
            pathfinder: Pathfinder::new(),
            flow_field: FlowField::new(),
            spatial: SpatialGrid::new(width * TILE_SIZE, height * TILE_SIZE),
            events: EventLog::default(),
            hashes: HashRing::new(),
            last_tick_hash: 0,
            visibility_changes: Vec::new(),
            timeline: ReplayTimeline::default(),
            replay_recording: false,
            playback_cursor: 0,
            rollback: None,
            resimulating: false,
            config,
        };
        sim.last_tick_hash = sim.world.compute_hash(sim.unit_types.version());
        sim
    }

    /// Register a unit type and return its id.
    pub fn register_unit_type(&mut self, data: UnitData) -> Result<UnitTypeId> {
        self.unit_types
            .register(data)
            .ok_or_else(|| GameError::InvalidState("unit type table is full".to_string()))
    }

    // ========================================================================
    // Read-only access
    // ========================================================================

    /// Current tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.world.tick
    }

    /// The world state.
    #[must_use]
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    /// Registered unit types.
    #[must_use]
    pub const fn unit_types(&self) -> &UnitTypeTable {
        &self.unit_types
    }

    /// Building and tech definitions.
    #[must_use]
    pub const fn content(&self) -> &ContentRegistry {
        &self.content
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Occupancy grid.
    #[must_use]
    pub const fn nav_grid(&self) -> &NavGrid {
        &self.nav
    }

    /// The flow field.
    #[must_use]
    pub const fn flow_field(&self) -> &FlowField {
        &self.flow_field
    }

    /// Faction by id.
    #[must_use]
    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.world.faction(id)
    }

    /// Event buffers.
    #[must_use]
    pub const fn events(&self) -> &EventLog {
        &self.events
    }

    /// Take every undrained domain event.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain_sim()
    }

    /// Take every undrained damage record.
    pub fn drain_damage_events(&mut self) -> Vec<DamageEvent> {
        self.events.drain_damage()
    }

    /// Hash computed at the end of the last tick.
    #[must_use]
    pub const fn last_tick_hash(&self) -> u64 {
        self.last_tick_hash
    }

    /// Up to `max` `(tick, hash)` pairs, newest first.
    #[must_use]
    pub fn recent_hashes(&self, max: usize) -> Vec<(u64, u64)> {
        self.hashes.recent(max)
    }

    /// Hash recorded for `tick`, if still in the history ring.
    #[must_use]
    pub fn hash_at_tick(&self, tick: u64) -> Option<u64> {
        self.hashes.at_tick(tick)
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Replace a faction's stockpile.
    pub fn set_faction_resources(&mut self, faction: FactionId, stock: ResourceStock) -> Result<()> {
        self.faction_mut(faction)?.resources = stock;
        Ok(())
    }

    /// Set a faction's base population cap.
    pub fn set_faction_pop_cap(&mut self, faction: FactionId, cap: i32) -> Result<()> {
        self.faction_mut(faction)?.pop_cap = cap.max(0);
        Ok(())
    }

    /// Enable or disable automatic gathering for idle workers.
    pub fn set_auto_assign_workers(&mut self, enabled: bool) {
        self.config.auto_assign_workers = enabled;
    }

    /// Mark or clear a terrain tile in the occupancy grid.
    pub fn set_terrain_blocked(&mut self, tile_x: i32, tile_y: i32, blocked: bool) {
        if self.nav.set_blocked(tile_x, tile_y, blocked) {
            self.flow_field.mark_dirty();
        }
    }

    /// Resize the map. Dimensions clamp to `1..=128` tiles.
    ///
    /// Grids are rebuilt from scratch: terrain marks are lost, building
    /// footprints are re-reserved and both fog grids restart empty.
    pub fn configure_map_size(&mut self, width: i32, height: i32) {
        self.config.map_width = width;
        self.config.map_height = height;
        let (width, height) = self.config.clamped_map_size();
        self.nav = NavGrid::new(width, height);
        for building in &self.world.buildings {
            let (tx, ty) = building.origin_tile();
            self.nav
                .set_rect(tx, ty, building.footprint_w, building.footprint_h, true);
        }
        self.world.visibility = FogGrid::new(width, height);
        self.world.explored = FogGrid::new(width, height);
        self.spatial = SpatialGrid::new(width * TILE_SIZE, height * TILE_SIZE);
        self.flow_field.mark_dirty();
        self.visibility_changes.clear();
    }

    /// Map bounds in milli-units, inclusive.
    pub(crate) fn map_bounds(&self) -> (i32, i32) {
        (
            self.nav.width() * TILE_SIZE - 1,
            self.nav.height() * TILE_SIZE - 1,
        )
    }

    pub(crate) fn clamp_to_map(&self, x: i32, y: i32) -> (i32, i32) {
        let (max_x, max_y) = self.map_bounds();
        (x.clamp(0, max_x), y.clamp(0, max_y))
    }

    pub(crate) fn faction_mut(&mut self, faction: FactionId) -> Result<&mut Faction> {
        self.world
            .factions
            .get_mut(faction.index())
            .ok_or(GameError::InvalidFaction(faction))
    }

    // ========================================================================
    // Spawning and destruction
    // ========================================================================

    /// Spawn a unit. `hp <= 0` means the type's max HP.
    ///
    /// Fails without mutation when the faction has no population headroom.
    pub fn spawn_unit(
        &mut self,
        unit_type: UnitTypeId,
        faction: FactionId,
        x: i32,
        y: i32,
        hp: i32,
    ) -> Result<EntityId> {
        let data = self
            .unit_types
            .get(unit_type)
            .ok_or(GameError::UnknownUnitType(unit_type))?;
        let (max_hp, pop_cost) = (data.max_hp, data.pop_cost);
        self.faction_mut(faction)?.check_pop_headroom(pop_cost)?;
        let hp = if hp <= 0 { max_hp.max(1) } else { hp };
        Ok(self.spawn_unit_unchecked(unit_type, faction, x, y, hp, pop_cost))
    }

    pub(crate) fn spawn_unit_unchecked(
        &mut self,
        unit_type: UnitTypeId,
        faction: FactionId,
        x: i32,
        y: i32,
        hp: i32,
        pop_cost: i32,
    ) -> EntityId {
        let (x, y) = self.clamp_to_map(x, y);
        let id = self.world.alloc_id();
        self.world
            .push_unit(Unit::new(id, unit_type, faction, x, y, hp));
        let entry = &mut self.world.factions[faction.index()];
        entry.pop += pop_cost;
        entry.active = true;
        self.events.push(
            self.world.tick,
            SimEventKind::UnitSpawned {
                unit: id,
                unit_type,
                faction,
            },
        );
        trace!(%id, %unit_type, %faction, x, y, "unit spawned");
        id
    }

    /// Place a completed building with its origin at `(x, y)` milli-units.
    ///
    /// The origin snaps to its tile, the footprint is reserved and the
    /// faction gains the type's population capacity.
    pub fn spawn_building(
        &mut self,
        building_type: BuildingTypeId,
        faction: FactionId,
        x: i32,
        y: i32,
    ) -> Result<EntityId> {
        let id = self.place_building(building_type, faction, x, y, false)?;
        Ok(id)
    }

    /// Spawn a resource node. Negative amounts become 0.
    pub fn spawn_resource_node(&mut self, kind: ResourceKind, x: i32, y: i32, amount: i32) -> EntityId {
        let (x, y) = self.clamp_to_map(x, y);
        let id = self.world.alloc_id();
        self.world.push_node(ResourceNode {
            id,
            kind,
            x,
            y,
            amount_remaining: amount.max(0),
        });
        id
    }

    /// Destroy a unit and evaluate defeat and victory.
    pub fn remove_unit(&mut self, id: EntityId) -> Result<()> {
        self.destroy_unit(id)?;
        self.evaluate_win_loss();
        Ok(())
    }

    /// Destroy a building and evaluate defeat and victory.
    pub fn remove_building(&mut self, id: EntityId) -> Result<()> {
        self.destroy_building(id)?;
        self.evaluate_win_loss();
        Ok(())
    }

    pub(crate) fn destroy_unit(&mut self, id: EntityId) -> Result<Unit> {
        let index = self.world.unit_index(id).ok_or(GameError::EntityNotFound(id))?;
        let unit = self.world.swap_remove_unit(index);
        let pop_cost = self.unit_types.get(unit.type_id).map_or(0, |t| t.pop_cost);
        let faction = &mut self.world.factions[unit.faction.index()];
        faction.pop = (faction.pop - pop_cost).max(0);
        self.events.push(
            self.world.tick,
            SimEventKind::UnitDied {
                unit: id,
                unit_type: unit.type_id,
                faction: unit.faction,
            },
        );
        Ok(unit)
    }

    pub(crate) fn destroy_building(&mut self, id: EntityId) -> Result<Building> {
        let index = self
            .world
            .building_index(id)
            .ok_or(GameError::EntityNotFound(id))?;
        let building = self.world.swap_remove_building(index);
        if !building.under_construction {
            let provided = self
                .content
                .building(building.type_id)
                .map_or(0, |b| b.provides_population);
            let faction = &mut self.world.factions[building.faction.index()];
            faction.pop_cap = (faction.pop_cap - provided).max(0);
        }
        let (tx, ty) = building.origin_tile();
        self.nav
            .set_rect(tx, ty, building.footprint_w, building.footprint_h, false);
        self.flow_field.mark_dirty();
        self.events.push(
            self.world.tick,
            SimEventKind::BuildingDestroyed {
                building: id,
                building_type: building.type_id,
                faction: building.faction,
            },
        );
        Ok(building)
    }

    /// Mark factions that lost their last entity and announce a sole survivor.
    pub(crate) fn evaluate_win_loss(&mut self) {
        let mut owned = [0usize; MAX_FACTIONS];
        for unit in &self.world.units {
            owned[unit.faction.index()] += 1;
        }
        for building in &self.world.buildings {
            owned[building.faction.index()] += 1;
        }

        let tick = self.world.tick;
        let mut any_defeated = false;
        for (index, faction) in self.world.factions.iter_mut().enumerate() {
            if faction.active && !faction.defeated && owned[index] == 0 {
                faction.defeated = true;
                self.events.push(
                    tick,
                    SimEventKind::FactionDefeated {
                        faction: FactionId(index as u8),
                    },
                );
                debug!(faction = index, tick, "faction defeated");
            }
            any_defeated |= faction.defeated;
        }

        if self.world.victory_declared || !any_defeated {
            return;
        }
        let mut survivors = self
            .world
            .factions
            .iter()
            .enumerate()
            .filter(|(_, f)| f.active && !f.defeated);
        if let (Some((winner, _)), None) = (survivors.next(), survivors.next()) {
            self.world.victory_declared = true;
            self.events.push(
                tick,
                SimEventKind::Victory {
                    faction: FactionId(winner as u8),
                },
            );
            debug!(faction = winner, tick, "victory");
        }
    }

    // ========================================================================
    // Flow field
    // ========================================================================

    /// Point the shared flow field at a tile.
    pub fn set_flow_field_target(&mut self, tile: (i32, i32)) {
        self.flow_field.set_target(tile);
    }

    /// Deactivate the shared flow field.
    pub fn clear_flow_field(&mut self) {
        self.flow_field.clear();
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the simulation by one tick.
    pub fn tick(&mut self) {
        self.world.tick += 1;
        let tick = self.world.tick;
        self.events.begin_tick();

        // 1. Spatial grid
        self.spatial.rebuild(&self.world.units);

        // 2. Flow field
        if self.flow_field.needs_rebuild() {
            self.flow_field.rebuild(&self.nav);
        }

        // 3. Journaled input due this tick
        self.inject_playback_commands();

        // 4-5. Commands and orders
        self.drain_ready_commands();
        self.promote_queued_orders();

        // 6. Movement
        self.movement_step();

        // 7. Vision
        self.vision_step();

        // 8. Production
        self.construction_step();
        self.training_step();

        // 9. Research
        self.research_step();

        // 10. Combat
        self.combat_step();

        // 11-12. Economy
        self.gather_step();
        if self.config.auto_assign_workers {
            self.auto_assign_idle_workers();
        }

        // 13. Hash
        let hash = self.world.compute_hash(self.unit_types.version());
        self.last_tick_hash = hash;
        self.hashes.push(tick, hash);
        debug!(tick, state_hash = hash, "Simulation state hash");
        #[cfg(feature = "debug-validation")]
        if let Err(e) = self.world.validate() {
            tracing::error!(tick, error = %e, "world invariant violated");
        }

        // 14. Replay frame
        if self.replay_recording && !self.resimulating {
            self.record_replay_frame();
        }

        // 15. Rollback snapshot
        self.record_rollback_snapshot();
    }

    /// Advance `count` ticks.
    pub fn run_ticks(&mut self, count: u64) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Tile under a milli-unit position.
    #[must_use]
    pub const fn tile_of(x: i32, y: i32) -> (i32, i32) {
        (to_tile(x), to_tile(y))
    }
}
