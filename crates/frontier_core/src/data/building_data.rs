//! Building data structures for data-driven building definitions.

use serde::{Deserialize, Serialize};

use crate::factions::{ResourceKind, ResourceStock};

/// Footprint used when a definition leaves it unset.
pub const DEFAULT_FOOTPRINT: i32 = 2;

/// Build time used when a definition leaves it unset.
pub const DEFAULT_BUILD_TIME_MS: i32 = 10_000;

/// Hit points used when a definition leaves them unset.
pub const DEFAULT_BUILDING_HP: i32 = 1000;

/// Data-driven building definition.
///
/// Every numeric field tolerates being absent or zero; the effective
/// accessors apply defaults.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     id: "town_center",
///     max_hp: 2400,
///     footprint_w: 3,
///     footprint_h: 3,
///     build_time_ms: 60000,
///     cost: (wood: 275, stone: 100),
///     provides_population: 10,
///     accepts_deposit: [],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingData {
    /// Stable string identifier.
    pub id: String,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Footprint width in tiles.
    pub footprint_w: i32,
    /// Footprint height in tiles.
    pub footprint_h: i32,
    /// Construction time.
    pub build_time_ms: i32,
    /// Construction cost.
    pub cost: ResourceStock,
    /// Population capacity granted once complete.
    pub provides_population: i32,
    /// Resources this building accepts as a drop-off. Empty accepts all.
    pub accepts_deposit: Vec<ResourceKind>,
    /// Minimum faction age required to start construction.
    pub age: i32,
}

impl BuildingData {
    /// Footprint with defaults applied.
    #[must_use]
    pub const fn footprint(&self) -> (i32, i32) {
        let w = if self.footprint_w > 0 {
            self.footprint_w
        } else {
            DEFAULT_FOOTPRINT
        };
        let h = if self.footprint_h > 0 {
            self.footprint_h
        } else {
            DEFAULT_FOOTPRINT
        };
        (w, h)
    }

    /// Build time with the default applied.
    #[must_use]
    pub const fn effective_build_time_ms(&self) -> i32 {
        if self.build_time_ms > 0 {
            self.build_time_ms
        } else {
            DEFAULT_BUILD_TIME_MS
        }
    }

    /// Max HP with the default applied.
    #[must_use]
    pub const fn effective_max_hp(&self) -> i32 {
        if self.max_hp > 0 {
            self.max_hp
        } else {
            DEFAULT_BUILDING_HP
        }
    }

    /// Whether gatherers may drop `kind` here.
    #[must_use]
    pub fn accepts(&self, kind: ResourceKind) -> bool {
        self.accepts_deposit.is_empty() || self.accepts_deposit.contains(&kind)
    }
}
