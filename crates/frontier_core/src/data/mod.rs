//! Read-only content definitions for units, buildings and technologies.
//!
//! All structs deserialize from RON. Definitions are addressed either by
//! stable string id or by their index in the registry. Absent entries are
//! tolerated: lookups return `None` and callers fall back to defaults.
//!
//! **Note:** This module contains no IO - it only parses text handed to it.

mod building_data;
mod tech_data;
mod unit_data;

pub use building_data::{
    BuildingData, DEFAULT_BUILDING_HP, DEFAULT_BUILD_TIME_MS, DEFAULT_FOOTPRINT,
};
pub use tech_data::{TechData, TechEffect};
pub use unit_data::{
    AttackStats, DamageTable, GatherStats, ProjectileStats, UnitData, DEFAULT_TRAIN_TIME_MS,
    PERMILLE,
};

use serde::{Deserialize, Serialize};

use crate::components::{BuildingTypeId, TechId};
use crate::error::{GameError, Result};

/// The content a host supplies to a simulator.
///
/// # Example
///
/// ```
/// use frontier_core::data::ContentRegistry;
///
/// let content = ContentRegistry::from_ron_str(
///     "content",
///     "(buildings: [(id: \"house\", provides_population: 5)], techs: [(id: \"loom\")])",
/// )
/// .unwrap();
/// assert_eq!(content.building_index("house").map(|b| b.0), Some(0));
/// assert!(content.tech_index("wheel").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentRegistry {
    /// Unit types, registered in order when a simulator is built from this content.
    pub units: Vec<UnitData>,
    /// Building definitions indexed by [`BuildingTypeId`].
    pub buildings: Vec<BuildingData>,
    /// Tech definitions indexed by [`TechId`].
    pub techs: Vec<TechData>,
}

impl ContentRegistry {
    /// Parse a registry from RON text. `label` names the source in errors.
    pub fn from_ron_str(label: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: label.to_string(),
            message: e.to_string(),
        })
    }

    /// Building definition by index.
    #[must_use]
    pub fn building(&self, id: BuildingTypeId) -> Option<&BuildingData> {
        self.buildings.get(id.index())
    }

    /// Tech definition by index.
    #[must_use]
    pub fn tech(&self, id: TechId) -> Option<&TechData> {
        self.techs.get(id.index())
    }

    /// Resolve a building's string id.
    #[must_use]
    pub fn building_index(&self, id: &str) -> Option<BuildingTypeId> {
        self.buildings
            .iter()
            .position(|b| b.id == id)
            .and_then(|i| u16::try_from(i).ok())
            .map(BuildingTypeId)
    }

    /// Resolve a tech's string id.
    #[must_use]
    pub fn tech_index(&self, id: &str) -> Option<TechId> {
        self.techs
            .iter()
            .position(|t| t.id == id)
            .and_then(|i| u16::try_from(i).ok())
            .map(TechId)
    }
}
