//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::factions::FactionId;
use crate::pathfinding::MAX_GRID_SIZE;
use crate::rng::DEFAULT_SEED;

/// Ticks between rollback snapshots.
pub const DEFAULT_ROLLBACK_INTERVAL: u64 = 20;

/// Rollback snapshots kept.
pub const DEFAULT_ROLLBACK_CAPACITY: usize = 16;

/// Ticks between full snapshots in a replay timeline.
pub const DEFAULT_REPLAY_SNAPSHOT_INTERVAL: u64 = 50;

/// Startup parameters of a [`Simulator`](crate::simulation::Simulator).
///
/// # Example RON
///
/// ```ron
/// SimConfig(
///     seed: 12648430,
///     map_width: 64,
///     map_height: 64,
///     auto_assign_workers: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed of the simulation RNG.
    pub seed: u32,
    /// Map width in tiles, clamped to `1..=128`.
    pub map_width: i32,
    /// Map height in tiles, clamped to `1..=128`.
    pub map_height: i32,
    /// Send idle workers to the nearest non-empty node every tick.
    pub auto_assign_workers: bool,
    /// Faction whose units drive the visibility grids.
    pub local_vision_faction: FactionId,
    /// Sight radius of every unit, in tiles.
    pub vision_radius_tiles: i32,
    /// Ticks between rollback snapshots.
    pub rollback_interval: u64,
    /// Rollback snapshots kept.
    pub rollback_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            map_width: MAX_GRID_SIZE,
            map_height: MAX_GRID_SIZE,
            auto_assign_workers: false,
            local_vision_faction: FactionId(0),
            vision_radius_tiles: 6,
            rollback_interval: DEFAULT_ROLLBACK_INTERVAL,
            rollback_capacity: DEFAULT_ROLLBACK_CAPACITY,
        }
    }
}

impl SimConfig {
    /// Parse a config from RON text. `label` names the source in errors.
    pub fn from_ron_str(label: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: label.to_string(),
            message: e.to_string(),
        })
    }

    /// Map size with the grid limits applied.
    #[must_use]
    pub fn clamped_map_size(&self) -> (i32, i32) {
        (
            self.map_width.clamp(1, MAX_GRID_SIZE),
            self.map_height.clamp(1, MAX_GRID_SIZE),
        )
    }
}
