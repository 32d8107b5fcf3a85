//! Unit type definitions.
//!
//! A unit type is registered once and referenced by [`UnitTypeId`] index.
//! Research effects are the only thing that mutates it afterwards.
//!
//! [`UnitTypeId`]: crate::components::UnitTypeId

use serde::{Deserialize, Serialize};

use crate::components::DamageType;
use crate::factions::{ResourceKind, ResourceStock};

/// Train time used when a unit type leaves it unset.
pub const DEFAULT_TRAIN_TIME_MS: i32 = 5000;

/// Multiplier scale for offense values (1000 = x1.0).
pub const PERMILLE: i32 = 1000;

/// One integer per damage type.
///
/// Used for armor (flat reduction) and for offense (permille multiplier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageTable {
    /// Melee column.
    pub melee: i32,
    /// Pierce column.
    pub pierce: i32,
    /// Siege column.
    pub siege: i32,
    /// Magic column.
    pub magic: i32,
}

impl DamageTable {
    /// Build a table from the four columns.
    #[must_use]
    pub const fn new(melee: i32, pierce: i32, siege: i32, magic: i32) -> Self {
        Self {
            melee,
            pierce,
            siege,
            magic,
        }
    }

    /// Value for one damage type.
    #[must_use]
    pub const fn get(&self, damage_type: DamageType) -> i32 {
        match damage_type {
            DamageType::Melee => self.melee,
            DamageType::Pierce => self.pierce,
            DamageType::Siege => self.siege,
            DamageType::Magic => self.magic,
        }
    }

    /// Whether every column is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.melee == 0 && self.pierce == 0 && self.siege == 0 && self.magic == 0
    }
}

/// Projectile parameters of a ranged attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectileStats {
    /// Flight speed in milli-units per second.
    pub speed: i32,
    /// Time before the projectile fizzles.
    pub lifetime_ms: i32,
    /// Whether it tracks the target.
    #[serde(default)]
    pub homing: bool,
}

/// Attack parameters. Zero damage means the type never attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackStats {
    /// Base damage per hit.
    pub damage: i32,
    /// Range in milli-units.
    pub range: i32,
    /// Time between attack commits.
    pub cooldown_ms: i32,
    /// Pre-commit windup.
    pub windup_ms: i32,
    /// Delay between commit and impact for non-projectile attacks.
    pub impact_delay_ms: i32,
    /// Present for ranged attacks.
    pub projectile: Option<ProjectileStats>,
}

/// Gathering parameters.
///
/// Rates are in thousandths of a resource per second. A zero per-resource
/// rate falls back to `average_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatherStats {
    /// Rate used when no per-resource rate is set.
    pub average_rate: i32,
    /// Food rate.
    pub food_rate: i32,
    /// Wood rate.
    pub wood_rate: i32,
    /// Stone rate.
    pub stone_rate: i32,
    /// Metal rate.
    pub metal_rate: i32,
    /// Most resources a unit carries at once.
    pub carry_capacity: i32,
}

impl GatherStats {
    /// Effective rate for a resource.
    #[must_use]
    pub const fn rate_for(&self, kind: ResourceKind) -> i32 {
        let specific = match kind {
            ResourceKind::Food => self.food_rate,
            ResourceKind::Wood => self.wood_rate,
            ResourceKind::Stone => self.stone_rate,
            ResourceKind::Metal => self.metal_rate,
        };
        if specific > 0 {
            specific
        } else {
            self.average_rate
        }
    }

    pub(crate) fn rates_mut(&mut self) -> [&mut i32; 5] {
        [
            &mut self.average_rate,
            &mut self.food_rate,
            &mut self.wood_rate,
            &mut self.stone_rate,
            &mut self.metal_rate,
        ]
    }
}

/// Data-driven unit type definition.
///
/// # Example RON
///
/// ```ron
/// UnitData(
///     id: "spearman",
///     speed: 3000,
///     max_hp: 60,
///     attack: (damage: 8, range: 1500, cooldown_ms: 1000),
///     offense: (melee: 1000),
///     armor: (melee: 1, pierce: 0),
///     pop_cost: 1,
///     cost: (food: 50),
///     train_time_ms: 6000,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitData {
    /// Stable string identifier.
    pub id: String,
    /// Movement speed in milli-units per second.
    pub speed: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Attack parameters.
    pub attack: AttackStats,
    /// Offense multipliers per damage type, in permille.
    pub offense: DamageTable,
    /// Flat armor per damage type.
    pub armor: DamageTable,
    /// Gathering parameters.
    pub gather: GatherStats,
    /// Can gather and is targeted by worker-only research.
    pub is_worker: bool,
    /// Population consumed.
    pub pop_cost: i32,
    /// Training cost.
    pub cost: ResourceStock,
    /// Training time; 0 means [`DEFAULT_TRAIN_TIME_MS`].
    pub train_time_ms: i32,
}

impl UnitData {
    /// Whether this type can engage in combat.
    #[must_use]
    pub const fn is_combatant(&self) -> bool {
        self.attack.damage > 0
    }

    /// Training time with the default applied.
    #[must_use]
    pub const fn effective_train_time_ms(&self) -> i32 {
        if self.train_time_ms > 0 {
            self.train_time_ms
        } else {
            DEFAULT_TRAIN_TIME_MS
        }
    }

    /// Offense multipliers, treating an all-zero table as melee x1.
    #[must_use]
    pub const fn effective_offense(&self) -> DamageTable {
        if self.offense.is_zero() {
            DamageTable::new(PERMILLE, 0, 0, 0)
        } else {
            self.offense
        }
    }
}
