//! Versioned world snapshots.
//!
//! A [`WorldSnapshot`] captures every field of the world state plus the
//! per-unit side tables, the unit type table and the occupancy grid.
//! Snapshots persist as JSON so that older versions, which lack fields
//! introduced later, can be migrated step by step before being decoded.
//!
//! # Version history
//!
//! - **v1**: no spawn ticks; factions carry no `age` or `active` flag.
//! - **v2**: spawn ticks and faction `age`/`active`/`defeated`; a single
//!   research slot stored as `research_tech`, `research_remaining_ms` and
//!   `research_total_ms`.
//! - **v3**: the research slot array.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::components::{Building, Command, EntityId, Projectile, QueuedOrder, ResourceNode, Unit};
use crate::data::UnitData;
use crate::error::{GameError, Result};
use crate::factions::{Faction, MAX_CONCURRENT_RESEARCH, MAX_FACTIONS};
use crate::math::TILE_SIZE;
use crate::pathfinding::NavGrid;
use crate::rng::DeterministicRng;
use crate::simulation::Simulator;
use crate::spatial::SpatialGrid;
use crate::unit_types::UnitTypeTable;
use crate::world::{FogGrid, MAX_PATH_WAYPOINTS, MAX_QUEUED_ORDERS};

/// Snapshot format written by this build.
pub const SNAPSHOT_VERSION: u32 = 3;

/// Complete, serializable copy of the simulation state.
///
/// Missing arrays decode as empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSnapshot {
    /// Format version.
    pub version: u32,
    /// Tick the snapshot was taken after.
    pub tick: u64,
    /// Next entity id.
    pub next_entity_id: u32,
    /// RNG state.
    pub rng_state: u32,
    /// Units.
    pub units: Vec<Unit>,
    /// Buildings.
    pub buildings: Vec<Building>,
    /// Resource nodes.
    pub resource_nodes: Vec<ResourceNode>,
    /// Projectiles in flight.
    pub projectiles: Vec<Projectile>,
    /// Faction table; short tables are padded with defaults.
    pub factions: Vec<Faction>,
    /// Current visibility.
    pub visibility: FogGrid,
    /// Explored tiles.
    pub explored: FogGrid,
    /// Victory already announced.
    pub victory_declared: bool,
    /// Commands not yet drained.
    pub pending_commands: Vec<Command>,
    /// Queued orders per unit, at most [`MAX_QUEUED_ORDERS`] each.
    pub order_queues: Vec<(EntityId, Vec<QueuedOrder>)>,
    /// Remaining path per unit, at most [`MAX_PATH_WAYPOINTS`] each.
    pub paths: Vec<(EntityId, Vec<(i32, i32)>)>,
    /// Spawn tick per entity.
    pub spawn_ticks: Vec<(EntityId, u64)>,
    /// Unit type table contents.
    pub unit_types: Vec<UnitData>,
    /// Unit type table version.
    pub unit_types_version: u64,
    /// Map width in tiles.
    pub map_width: i32,
    /// Map height in tiles.
    pub map_height: i32,
    /// Blocked tiles, terrain and footprints alike.
    pub blocked_tiles: Vec<(i32, i32)>,
    /// Shared flow field target.
    pub flow_target: Option<(i32, i32)>,
}

/// What happened while decoding a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotLoadReport {
    /// Version found in the input.
    pub from_version: u32,
    /// Migration steps applied, oldest first.
    pub migrations_applied: Vec<String>,
    /// Non-fatal problems the caller should surface.
    pub warnings: Vec<String>,
}

impl WorldSnapshot {
    /// Encode as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Decode JSON of any known version, migrating it to the current one.
    ///
    /// A version newer than this build is accepted best-effort; unknown
    /// fields are ignored and the report carries a warning.
    pub fn from_json(text: &str) -> Result<(Self, SnapshotLoadReport)> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| GameError::Serialization(e.to_string()))?;
        let (value, report) = migrate(value)?;
        let snapshot = serde_json::from_value(value).map_err(|e| GameError::Serialization(e.to_string()))?;
        Ok((snapshot, report))
    }
}

/// Bring a decoded snapshot document up to [`SNAPSHOT_VERSION`].
pub fn migrate(mut value: Value) -> Result<(Value, SnapshotLoadReport)> {
    let root = value
        .as_object_mut()
        .ok_or_else(|| GameError::Serialization("snapshot is not a JSON object".to_string()))?;
    let from_version = root
        .get("version")
        .and_then(Value::as_u64)
        .map_or(1, |v| u32::try_from(v).unwrap_or(u32::MAX));
    let mut report = SnapshotLoadReport {
        from_version,
        ..SnapshotLoadReport::default()
    };

    if from_version > SNAPSHOT_VERSION {
        let message = format!(
            "snapshot version {from_version} is newer than supported version {SNAPSHOT_VERSION}; loading best-effort"
        );
        warn!(from_version, supported = SNAPSHOT_VERSION, "future snapshot version");
        report.warnings.push(message);
        return Ok((value, report));
    }

    let mut version = from_version.max(1);
    while version < SNAPSHOT_VERSION {
        match version {
            1 => migrate_v1_to_v2(root),
            2 => migrate_v2_to_v3(root),
            _ => {}
        }
        report.migrations_applied.push(format!("v{version}->v{}", version + 1));
        version += 1;
    }
    root.insert("version".to_string(), json!(SNAPSHOT_VERSION));
    if !report.migrations_applied.is_empty() {
        debug!(from_version, steps = report.migrations_applied.len(), "snapshot migrated");
    }
    Ok((value, report))
}

fn entity_ids(root: &Map<String, Value>, key: &str) -> Vec<(u64, Option<u64>)> {
    root.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let id = item.get("id")?.as_u64()?;
                    let faction = item.get("faction").and_then(Value::as_u64);
                    Some((id, faction))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Spawn ticks are unknown for v1 entities and recorded as 0. A faction
/// owning any unit or building becomes active so it can still be defeated.
fn migrate_v1_to_v2(root: &mut Map<String, Value>) {
    let owned: Vec<(u64, Option<u64>)> = entity_ids(root, "units")
        .into_iter()
        .chain(entity_ids(root, "buildings"))
        .collect();
    let nodes = entity_ids(root, "resource_nodes");

    let mut spawn_ticks: Vec<(u64, u64)> = owned.iter().chain(&nodes).map(|(id, _)| (*id, 0)).collect();
    spawn_ticks.sort_unstable();
    root.insert("spawn_ticks".to_string(), json!(spawn_ticks));

    if let Some(factions) = root.get_mut("factions").and_then(Value::as_array_mut) {
        for (index, faction) in factions.iter_mut().enumerate() {
            let Some(fields) = faction.as_object_mut() else {
                continue;
            };
            fields.entry("age").or_insert(json!(1));
            fields.entry("defeated").or_insert(json!(false));
            let owns = owned.iter().any(|(_, f)| *f == Some(index as u64));
            fields.entry("active").or_insert(json!(owns));
        }
    }
}

fn migrate_v2_to_v3(root: &mut Map<String, Value>) {
    let Some(factions) = root.get_mut("factions").and_then(Value::as_array_mut) else {
        return;
    };
    for faction in factions {
        let Some(fields) = faction.as_object_mut() else {
            continue;
        };
        let tech = fields.remove("research_tech").unwrap_or(Value::Null);
        let remaining = fields.remove("research_remaining_ms").unwrap_or(json!(0));
        let total = fields.remove("research_total_ms").unwrap_or(json!(0));
        let mut slots = vec![json!({ "tech": null, "remaining_ms": 0, "total_ms": 0 }); MAX_CONCURRENT_RESEARCH];
        if !tech.is_null() {
            slots[0] = json!({ "tech": tech, "remaining_ms": remaining, "total_ms": total });
        }
        fields.insert("research".to_string(), Value::Array(slots));
    }
}

impl Simulator {
    /// Copy the whole simulation state into a snapshot.
    #[must_use]
    pub fn capture_snapshot(&self) -> WorldSnapshot {
        let world = &self.world;
        let mut blocked_tiles = Vec::new();
        for y in 0..self.nav.height() {
            for x in 0..self.nav.width() {
                if self.nav.is_blocked(x, y) {
                    blocked_tiles.push((x, y));
                }
            }
        }
        WorldSnapshot {
            version: SNAPSHOT_VERSION,
            tick: world.tick,
            next_entity_id: world.next_entity_id,
            rng_state: world.rng.state(),
            units: world.units.clone(),
            buildings: world.buildings.clone(),
            resource_nodes: world.resource_nodes.clone(),
            projectiles: world.projectiles.clone(),
            factions: world.factions.to_vec(),
            visibility: world.visibility.clone(),
            explored: world.explored.clone(),
            victory_declared: world.victory_declared,
            pending_commands: world.pending_commands.iter().copied().collect(),
            order_queues: world
                .order_queues
                .iter()
                .map(|(id, q)| (*id, q.iter().take(MAX_QUEUED_ORDERS).copied().collect()))
                .collect(),
            paths: world
                .paths
                .iter()
                .map(|(id, p)| (*id, p.iter().take(MAX_PATH_WAYPOINTS).copied().collect()))
                .collect(),
            spawn_ticks: world.spawn_ticks.iter().map(|(id, t)| (*id, *t)).collect(),
            unit_types: self.unit_types.iter().map(|(_, data)| data.clone()).collect(),
            unit_types_version: self.unit_types.version(),
            map_width: self.nav.width(),
            map_height: self.nav.height(),
            blocked_tiles,
            flow_target: self.flow_field.target(),
        }
    }

    /// Replace the simulation state with a snapshot.
    ///
    /// Replay, rollback and event buffers are left alone. Hash history
    /// newer than the snapshot tick is dropped.
    pub fn apply_snapshot(&mut self, snapshot: &WorldSnapshot) {
        let nav_width = if snapshot.map_width > 0 {
            snapshot.map_width
        } else {
            self.nav.width()
        };
        let nav_height = if snapshot.map_height > 0 {
            snapshot.map_height
        } else {
            self.nav.height()
        };
        let mut nav = NavGrid::new(nav_width, nav_height);
        for &(x, y) in &snapshot.blocked_tiles {
            nav.set_blocked(x, y, true);
        }
        let (width, height) = (nav.width(), nav.height());
        self.config.map_width = width;
        self.config.map_height = height;
        self.nav = nav;
        self.spatial = SpatialGrid::new(width * TILE_SIZE, height * TILE_SIZE);

        let world = &mut self.world;
        world.tick = snapshot.tick;
        world.next_entity_id = snapshot.next_entity_id.max(1);
        world.rng = DeterministicRng::from_state(snapshot.rng_state);
        world.units.clone_from(&snapshot.units);
        world.buildings.clone_from(&snapshot.buildings);
        world.resource_nodes.clone_from(&snapshot.resource_nodes);
        world.projectiles.clone_from(&snapshot.projectiles);
        world.factions = std::array::from_fn(|i| snapshot.factions.get(i).cloned().unwrap_or_default());
        world.visibility = FogGrid::from_cells(width, height, snapshot.visibility.cells().to_vec());
        world.explored = FogGrid::from_cells(width, height, snapshot.explored.cells().to_vec());
        world.victory_declared = snapshot.victory_declared;
        world.pending_commands = snapshot.pending_commands.iter().copied().collect();
        world.order_queues = snapshot
            .order_queues
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(id, q)| (*id, q.iter().take(MAX_QUEUED_ORDERS).copied().collect()))
            .collect();
        world.paths = snapshot
            .paths
            .iter()
            .filter(|(_, p)| !p.is_empty())
            .map(|(id, p)| (*id, p.iter().take(MAX_PATH_WAYPOINTS).copied().collect()))
            .collect();
        world.spawn_ticks = snapshot.spawn_ticks.iter().copied().collect();
        world.rebuild_lookups();

        self.unit_types = UnitTypeTable::restore(snapshot.unit_types.clone(), snapshot.unit_types_version);
        match snapshot.flow_target {
            Some(tile) => self.flow_field.set_target(tile),
            None => self.flow_field.clear(),
        }
        self.visibility_changes.clear();
        self.hashes.truncate_after(snapshot.tick);
        self.last_tick_hash = self.world.compute_hash(self.unit_types.version());
        debug!(tick = snapshot.tick, "snapshot applied");
    }

    /// Capture and encode the current state as JSON.
    pub fn save_snapshot_json(&self) -> Result<String> {
        self.capture_snapshot().to_json()
    }

    /// Decode, migrate and apply a JSON snapshot.
    pub fn load_snapshot_json(&mut self, text: &str) -> Result<SnapshotLoadReport> {
        let (snapshot, report) = WorldSnapshot::from_json(text)?;
        self.apply_snapshot(&snapshot);
        info!(
            tick = snapshot.tick,
            from_version = report.from_version,
            warnings = report.warnings.len(),
            "snapshot loaded"
        );
        Ok(report)
    }
}
