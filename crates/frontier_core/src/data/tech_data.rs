//! Tech tree data structures for data-driven technology definitions.

use serde::{Deserialize, Serialize};

use crate::factions::ResourceStock;
use crate::math::{fixed_decimal, Fixed};

/// Effect applied when a technology completes.
///
/// Stat modifiers act on every registered unit type, not just the
/// researching faction's units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TechEffect {
    /// Raise the researching faction's age to at least `age`.
    UnlockAge {
        /// Age reached.
        age: i32,
    },
    /// Multiply worker gather rates.
    GatherRateMul {
        /// Factor, authored as a decimal string.
        #[serde(with = "fixed_decimal")]
        factor: Fixed,
    },
    /// Add to worker gather rates (thousandths per second).
    GatherRateAdd {
        /// Amount added.
        amount: i32,
    },
    /// Add to melee and pierce armor.
    ArmorAdd {
        /// Amount added.
        amount: i32,
    },
    /// Multiply melee and pierce armor.
    ArmorMul {
        /// Factor, authored as a decimal string.
        #[serde(with = "fixed_decimal")]
        factor: Fixed,
    },
    /// Multiply base attack damage.
    AttackMul {
        /// Factor, authored as a decimal string.
        #[serde(with = "fixed_decimal")]
        factor: Fixed,
    },
    /// Add to base attack damage.
    AttackAdd {
        /// Amount added.
        amount: i32,
    },
}

/// Data-driven technology definition.
///
/// # Example RON
///
/// ```ron
/// TechData(
///     id: "wheelbarrow",
///     cost: (food: 175, wood: 50),
///     research_time_ms: 75000,
///     age: 2,
///     prerequisites: ["feudal_age"],
///     effects: [GatherRateMul(factor: "1.25")],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TechData {
    /// Stable string identifier, referenced by prerequisites.
    pub id: String,
    /// Research cost.
    pub cost: ResourceStock,
    /// Research time.
    pub research_time_ms: i32,
    /// Minimum faction age.
    pub age: i32,
    /// Technology ids that must be researched first.
    pub prerequisites: Vec<String>,
    /// Effects granted on completion.
    pub effects: Vec<TechEffect>,
}

impl TechData {
    /// Check if this technology has a specific prerequisite.
    #[must_use]
    pub fn requires(&self, tech_id: &str) -> bool {
        self.prerequisites.iter().any(|t| t == tech_id)
    }
}
