//! The single mutable aggregate advanced by the simulator.
//!
//! Entities live in dense arrays compacted by swap-remove. Per-unit orders,
//! paths and spawn ticks live in id-keyed side tables that are cleared when
//! the owning entity is destroyed. `BTreeMap` keeps every iteration over a
//! side table in id order.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::components::{Building, Command, EntityId, Projectile, QueuedOrder, ResourceNode, Unit};
use crate::error::{GameError, Result};
use crate::factions::{Faction, FactionId, MAX_FACTIONS};
use crate::hash::TickHasher;
use crate::rng::DeterministicRng;

/// Orders a unit may have waiting behind its active order.
pub const MAX_QUEUED_ORDERS: usize = 16;

/// Waypoints kept per unit path.
pub const MAX_PATH_WAYPOINTS: usize = 64;

/// Row-major byte grid sized to the active map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FogGrid {
    width: i32,
    height: i32,
    cells: Vec<u8>,
}

impl FogGrid {
    /// Grid of zeros.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![0; (width * height) as usize],
        }
    }

    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Cell value; 0 outside the grid.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return 0;
        }
        self.cells[(y * self.width + x) as usize]
    }

    /// Set a cell, ignoring coordinates outside the grid.
    pub fn set(&mut self, x: i32, y: i32, value: u8) {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            self.cells[(y * self.width + x) as usize] = value;
        }
    }

    /// Raw cells.
    #[must_use]
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Rebuild a grid from raw cells; a size mismatch yields zeros.
    #[must_use]
    pub fn from_cells(width: i32, height: i32, cells: Vec<u8>) -> Self {
        let mut grid = Self::new(width, height);
        if cells.len() == grid.cells.len() {
            grid.cells = cells;
        }
        grid
    }
}

/// Complete mutable simulation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldState {
    /// Ticks simulated so far.
    pub tick: u64,
    /// Next id handed out by any spawn.
    pub next_entity_id: u32,
    /// Deterministic RNG.
    pub rng: DeterministicRng,
    /// Live units.
    pub units: Vec<Unit>,
    /// Live buildings.
    pub buildings: Vec<Building>,
    /// Live resource nodes.
    pub resource_nodes: Vec<ResourceNode>,
    /// Projectiles in flight.
    pub projectiles: Vec<Projectile>,
    /// Fixed faction table.
    pub factions: [Faction; MAX_FACTIONS],
    /// Current visibility of the local vision faction.
    pub visibility: FogGrid,
    /// Tiles ever seen by the local vision faction.
    pub explored: FogGrid,
    /// Victory has been announced.
    pub victory_declared: bool,
    /// Submitted commands not yet drained.
    pub pending_commands: VecDeque<Command>,
    /// Orders waiting behind each unit's active order.
    pub order_queues: BTreeMap<EntityId, VecDeque<QueuedOrder>>,
    /// Remaining waypoint tiles per unit.
    pub paths: BTreeMap<EntityId, VecDeque<(i32, i32)>>,
    /// Tick at which each live entity was spawned.
    pub spawn_ticks: BTreeMap<EntityId, u64>,
    unit_lookup: HashMap<EntityId, usize>,
    building_lookup: HashMap<EntityId, usize>,
    node_lookup: HashMap<EntityId, usize>,
}

impl WorldState {
    /// Empty world for a map of `width` x `height` tiles.
    #[must_use]
    pub fn new(width: i32, height: i32, seed: u32) -> Self {
        Self {
            tick: 0,
            next_entity_id: 1,
            rng: DeterministicRng::new(seed),
            units: Vec::new(),
            buildings: Vec::new(),
            resource_nodes: Vec::new(),
            projectiles: Vec::new(),
            factions: std::array::from_fn(|_| Faction::default()),
            visibility: FogGrid::new(width, height),
            explored: FogGrid::new(width, height),
            victory_declared: false,
            pending_commands: VecDeque::new(),
            order_queues: BTreeMap::new(),
            paths: BTreeMap::new(),
            spawn_ticks: BTreeMap::new(),
            unit_lookup: HashMap::new(),
            building_lookup: HashMap::new(),
            node_lookup: HashMap::new(),
        }
    }

    /// Faction by id, if in range.
    #[must_use]
    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(id.index())
    }

    /// Dense index of a unit.
    #[must_use]
    pub fn unit_index(&self, id: EntityId) -> Option<usize> {
        self.unit_lookup.get(&id).copied()
    }

    /// Dense index of a building.
    #[must_use]
    pub fn building_index(&self, id: EntityId) -> Option<usize> {
        self.building_lookup.get(&id).copied()
    }

    /// Dense index of a resource node.
    #[must_use]
    pub fn node_index(&self, id: EntityId) -> Option<usize> {
        self.node_lookup.get(&id).copied()
    }

    /// Unit by id.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.unit_index(id).map(|i| &self.units[i])
    }

    /// Building by id.
    #[must_use]
    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.building_index(id).map(|i| &self.buildings[i])
    }

    /// Resource node by id.
    #[must_use]
    pub fn resource_node(&self, id: EntityId) -> Option<&ResourceNode> {
        self.node_index(id).map(|i| &self.resource_nodes[i])
    }

    /// Spawn tick of a live entity.
    #[must_use]
    pub fn spawn_tick(&self, id: EntityId) -> Option<u64> {
        self.spawn_ticks.get(&id).copied()
    }

    pub(crate) fn alloc_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    pub(crate) fn push_unit(&mut self, unit: Unit) {
        self.spawn_ticks.insert(unit.id, self.tick);
        self.unit_lookup.insert(unit.id, self.units.len());
        self.units.push(unit);
    }

    pub(crate) fn push_building(&mut self, building: Building) {
        self.spawn_ticks.insert(building.id, self.tick);
        self.building_lookup.insert(building.id, self.buildings.len());
        self.buildings.push(building);
    }

    pub(crate) fn push_node(&mut self, node: ResourceNode) {
        self.spawn_ticks.insert(node.id, self.tick);
        self.node_lookup.insert(node.id, self.resource_nodes.len());
        self.resource_nodes.push(node);
    }

    /// Swap-remove a unit and every side-table entry it owns.
    pub(crate) fn swap_remove_unit(&mut self, index: usize) -> Unit {
        let unit = self.units.swap_remove(index);
        self.unit_lookup.remove(&unit.id);
        if let Some(moved) = self.units.get(index) {
            self.unit_lookup.insert(moved.id, index);
        }
        self.order_queues.remove(&unit.id);
        self.paths.remove(&unit.id);
        self.spawn_ticks.remove(&unit.id);
        unit
    }

    /// Swap-remove a building and its spawn record.
    pub(crate) fn swap_remove_building(&mut self, index: usize) -> Building {
        let building = self.buildings.swap_remove(index);
        self.building_lookup.remove(&building.id);
        if let Some(moved) = self.buildings.get(index) {
            self.building_lookup.insert(moved.id, index);
        }
        self.spawn_ticks.remove(&building.id);
        building
    }

    /// Swap-remove a resource node and its spawn record.
    pub(crate) fn swap_remove_node(&mut self, index: usize) -> ResourceNode {
        let node = self.resource_nodes.swap_remove(index);
        self.node_lookup.remove(&node.id);
        if let Some(moved) = self.resource_nodes.get(index) {
            self.node_lookup.insert(moved.id, index);
        }
        self.spawn_ticks.remove(&node.id);
        node
    }

    /// Recompute the id lookups from the dense arrays.
    pub(crate) fn rebuild_lookups(&mut self) {
        self.unit_lookup = self.units.iter().enumerate().map(|(i, u)| (u.id, i)).collect();
        self.building_lookup = self
            .buildings
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id, i))
            .collect();
        self.node_lookup = self
            .resource_nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();
    }

    /// Check structural invariants.
    ///
    /// Every dense array entry must be reachable through its lookup, ids
    /// must come from the counter, and amounts that can only shrink to zero
    /// must not be negative.
    pub fn validate(&self) -> Result<()> {
        let stale = |kind: &str, id: EntityId| GameError::InvalidState(format!("{kind} {id} has a stale lookup"));
        for (i, u) in self.units.iter().enumerate() {
            if self.unit_lookup.get(&u.id) != Some(&i) {
                return Err(stale("unit", u.id));
            }
            if u.carry_amount < 0 || u.id.0 >= self.next_entity_id {
                return Err(GameError::InvalidState(format!("unit {} is corrupt", u.id)));
            }
        }
        for (i, b) in self.buildings.iter().enumerate() {
            if self.building_lookup.get(&b.id) != Some(&i) {
                return Err(stale("building", b.id));
            }
        }
        for (i, n) in self.resource_nodes.iter().enumerate() {
            if self.node_lookup.get(&n.id) != Some(&i) {
                return Err(stale("resource node", n.id));
            }
            if n.amount_remaining < 0 {
                return Err(GameError::InvalidState(format!("resource node {} is negative", n.id)));
            }
        }
        if self.unit_lookup.len() != self.units.len()
            || self.building_lookup.len() != self.buildings.len()
            || self.node_lookup.len() != self.resource_nodes.len()
        {
            return Err(GameError::InvalidState("lookup holds removed entities".to_string()));
        }
        Ok(())
    }

    /// Fold the whole world into a 64-bit hash.
    ///
    /// Visibility grids are excluded; they are derived from unit positions.
    #[must_use]
    pub fn compute_hash(&self, unit_types_version: u64) -> u64 {
        let mut h = TickHasher::new();
        h.add_u64(self.tick);
        h.add_u32(self.next_entity_id);

        h.add_u32(self.units.len() as u32);
        for u in &self.units {
            h.add_u32(u.id.0);
            h.add_u32(u32::from(u.type_id.0));
            h.add_u32(u32::from(u.faction.0));
            h.add_i32(u.x);
            h.add_i32(u.y);
            h.add_i32(u.hp);
            h.add_i32(u.target_x);
            h.add_i32(u.target_y);
            h.add_bool(u.has_move_target);
            h.add_i32(u.attack_cooldown_ms);
            h.add_i32(u.attack_windup_remaining_ms);
            h.add_i32(u.impact_remaining_ms);
            h.add_opt_u32(u.pending_attack_target.map(|e| e.0));
            h.add_i32(u.current_order.code());
            h.add_opt_u32(u.order_target.map(|e| e.0));
            h.add_opt_u32(u.attack_target.map(|e| e.0));
            h.add_i32(u.gather_progress);
            h.add_i32(u.carry_amount);
            h.add_u32(u.carry_kind.index() as u32);
            h.add_bool(u.returning_with_cargo);
        }

        h.add_u32(self.projectiles.len() as u32);
        for p in &self.projectiles {
            h.add_u32(p.id.0);
            h.add_i32(p.x);
            h.add_i32(p.y);
            h.add_u32(p.target.0);
            h.add_u32(u32::from(p.source_type.0));
            h.add_u32(u32::from(p.faction.0));
            h.add_i32(p.speed);
            h.add_i32(p.damage);
            h.add_i32(p.damage_type.code());
            h.add_i32(p.lifetime_remaining_ms);
            h.add_u32(p.attacker.0);
            h.add_bool(p.homing);
            h.add_i32(p.aim_x);
            h.add_i32(p.aim_y);
        }

        h.add_u32(self.buildings.len() as u32);
        for b in &self.buildings {
            h.add_u32(b.id.0);
            h.add_u32(u32::from(b.type_id.0));
            h.add_u32(u32::from(b.faction.0));
            h.add_i32(b.x);
            h.add_i32(b.y);
            h.add_i32(b.hp);
            h.add_i32(b.max_hp);
            h.add_i32(b.footprint_w);
            h.add_i32(b.footprint_h);
            h.add_bool(b.under_construction);
            h.add_i32(b.build_total_ms);
            h.add_i32(b.build_remaining_ms);
            match b.training {
                Some(slot) => {
                    h.add_u32(u32::from(slot.unit_type.0));
                    h.add_i32(slot.remaining_ms);
                    h.add_i32(slot.total_ms);
                }
                None => h.add_u32(u32::MAX),
            }
            h.add_u32(b.pending.len() as u32);
            for unit_type in &b.pending {
                h.add_u32(u32::from(unit_type.0));
            }
            match b.rally_point {
                Some((x, y)) => {
                    h.add_i32(x);
                    h.add_i32(y);
                }
                None => h.add_u32(u32::MAX),
            }
        }

        h.add_u32(self.resource_nodes.len() as u32);
        for n in &self.resource_nodes {
            h.add_u32(n.id.0);
            h.add_u32(n.kind.index() as u32);
            h.add_i32(n.x);
            h.add_i32(n.y);
            h.add_i32(n.amount_remaining);
        }

        for f in &self.factions {
            h.add_i32(f.resources.food);
            h.add_i32(f.resources.wood);
            h.add_i32(f.resources.stone);
            h.add_i32(f.resources.metal);
            h.add_i32(f.pop);
            h.add_i32(f.pop_cap);
            h.add_u64(f.tech_flags);
            h.add_i32(f.age);
            for slot in &f.research {
                h.add_opt_u32(slot.tech.map(|t| u32::from(t.0)));
                h.add_i32(slot.remaining_ms);
                h.add_i32(slot.total_ms);
            }
            h.add_bool(f.active);
            h.add_bool(f.defeated);
        }
        h.add_bool(self.victory_declared);

        for (id, queue) in &self.order_queues {
            h.add_u32(id.0);
            h.add_u32(queue.len() as u32);
            for order in queue {
                let (code, a, b) = order.hash_words();
                h.add_i32(code);
                h.add_i32(a);
                h.add_i32(b);
            }
        }
        for (id, path) in &self.paths {
            h.add_u32(id.0);
            h.add_u32(path.len() as u32);
            for &(tx, ty) in path {
                h.add_i32(tx);
                h.add_i32(ty);
            }
        }
        h.add_u32(self.pending_commands.len() as u32);
        for cmd in &self.pending_commands {
            h.add_u64(cmd.issue_tick);
            h.add_i32(cmd.kind.code());
            h.add_u32(cmd.entity.0);
            h.add_i32(cmd.target_x);
            h.add_i32(cmd.target_y);
        }
        h.add_u64(unit_types_version);

        h.add_u32(self.rng.state());
        h.finish()
    }
}
