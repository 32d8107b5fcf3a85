//! Faction identifiers and per-faction economy, population and tech state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::components::TechId;
use crate::error::{GameError, Result};

/// Size of the fixed faction table.
pub const MAX_FACTIONS: usize = 8;

/// Concurrent research slots per faction.
pub const MAX_CONCURRENT_RESEARCH: usize = 2;

/// Index into the fixed faction table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FactionId(pub u8);

impl FactionId {
    /// Position in the faction table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether the id addresses a slot of the faction table.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        (self.0 as usize) < MAX_FACTIONS
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction {}", self.0)
    }
}

/// The four gatherable resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Food.
    #[default]
    Food,
    /// Wood.
    Wood,
    /// Stone.
    Stone,
    /// Metal.
    Metal,
}

impl ResourceKind {
    /// All resources in counter order.
    pub const ALL: [Self; 4] = [Self::Food, Self::Wood, Self::Stone, Self::Metal];

    /// Position in a four-slot counter array.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Food => 0,
            Self::Wood => 1,
            Self::Stone => 2,
            Self::Metal => 3,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Food => "food",
            Self::Wood => "wood",
            Self::Stone => "stone",
            Self::Metal => "metal",
        };
        f.write_str(name)
    }
}

/// Amounts of each resource; used both as a stockpile and as a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceStock {
    /// Food.
    pub food: i32,
    /// Wood.
    pub wood: i32,
    /// Stone.
    pub stone: i32,
    /// Metal.
    pub metal: i32,
}

impl ResourceStock {
    /// Nothing.
    pub const ZERO: Self = Self {
        food: 0,
        wood: 0,
        stone: 0,
        metal: 0,
    };

    /// Build a stock from the four counters.
    #[must_use]
    pub const fn new(food: i32, wood: i32, stone: i32, metal: i32) -> Self {
        Self {
            food,
            wood,
            stone,
            metal,
        }
    }

    /// Amount of one resource.
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> i32 {
        match kind {
            ResourceKind::Food => self.food,
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::Metal => self.metal,
        }
    }

    /// Mutable access to one resource counter.
    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut i32 {
        match kind {
            ResourceKind::Food => &mut self.food,
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Stone => &mut self.stone,
            ResourceKind::Metal => &mut self.metal,
        }
    }

    /// Check affordability, reporting the first missing resource.
    pub fn check_afford(&self, cost: &Self) -> Result<()> {
        for kind in ResourceKind::ALL {
            let required = cost.get(kind);
            let available = self.get(kind);
            if available < required {
                return Err(GameError::InsufficientResources {
                    resource: kind,
                    required,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Subtract a cost. Callers check affordability first.
    pub fn deduct(&mut self, cost: &Self) {
        for kind in ResourceKind::ALL {
            *self.get_mut(kind) -= cost.get(kind);
        }
    }

    /// Add amounts back (refunds, deposits).
    pub fn add(&mut self, amount: &Self) {
        for kind in ResourceKind::ALL {
            *self.get_mut(kind) += amount.get(kind);
        }
    }

    /// Sum of all counters.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.food as i64 + self.wood as i64 + self.stone as i64 + self.metal as i64
    }
}

/// One research slot. `tech` is `None` when the slot is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResearchSlot {
    /// Tech being researched.
    pub tech: Option<TechId>,
    /// Time left.
    pub remaining_ms: i32,
    /// Total research time.
    pub total_ms: i32,
}

/// Per-faction economy, population and tech state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Faction {
    /// Stockpile.
    pub resources: ResourceStock,
    /// Population in use.
    pub pop: i32,
    /// Population capacity; 0 disables population accounting.
    pub pop_cap: i32,
    /// Researched techs, one bit per [`TechId`].
    pub tech_flags: u64,
    /// Unlocked age, starting at 1.
    pub age: i32,
    /// Concurrent research slots.
    pub research: [ResearchSlot; MAX_CONCURRENT_RESEARCH],
    /// Has ever owned an entity; only active factions can be defeated.
    pub active: bool,
    /// Defeat has been announced.
    pub defeated: bool,
}

impl Default for Faction {
    fn default() -> Self {
        Self {
            resources: ResourceStock::ZERO,
            pop: 0,
            pop_cap: 0,
            tech_flags: 0,
            age: 1,
            research: [ResearchSlot::default(); MAX_CONCURRENT_RESEARCH],
            active: false,
            defeated: false,
        }
    }
}

impl Faction {
    /// Whether a unit costing `cost` population fits under the cap.
    #[must_use]
    pub const fn has_pop_headroom(&self, cost: i32) -> bool {
        self.pop_cap <= 0 || self.pop + cost <= self.pop_cap
    }

    /// Population headroom check as a `Result`.
    pub fn check_pop_headroom(&self, cost: i32) -> Result<()> {
        if self.has_pop_headroom(cost) {
            Ok(())
        } else {
            Err(GameError::PopulationCapReached {
                pop: self.pop,
                cost,
                cap: self.pop_cap,
            })
        }
    }

    /// Whether a tech bit is set.
    #[must_use]
    pub const fn has_tech(&self, tech: TechId) -> bool {
        match tech.flag() {
            Some(bit) => self.tech_flags & bit != 0,
            None => false,
        }
    }

    /// Whether a tech occupies one of the research slots.
    #[must_use]
    pub fn is_researching(&self, tech: TechId) -> bool {
        self.research.iter().any(|slot| slot.tech == Some(tech))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_afford_reports_first_missing() {
        let stock = ResourceStock::new(100, 5, 0, 0);
        assert!(stock.check_afford(&ResourceStock::new(50, 5, 0, 0)).is_ok());
        match stock.check_afford(&ResourceStock::new(50, 10, 0, 0)) {
            Err(GameError::InsufficientResources {
                resource,
                required,
                available,
            }) => {
                assert_eq!(resource, ResourceKind::Wood);
                assert_eq!(required, 10);
                assert_eq!(available, 5);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_deduct_and_add_round_trip() {
        let mut stock = ResourceStock::new(100, 100, 100, 100);
        let cost = ResourceStock::new(10, 20, 30, 40);
        stock.deduct(&cost);
        assert_eq!(stock, ResourceStock::new(90, 80, 70, 60));
        stock.add(&cost);
        assert_eq!(stock.total(), 400);
    }

    #[test]
    fn test_pop_headroom() {
        let mut faction = Faction {
            pop: 9,
            pop_cap: 10,
            ..Faction::default()
        };
        assert!(faction.has_pop_headroom(1));
        assert!(!faction.has_pop_headroom(2));
        faction.pop_cap = 0;
        assert!(faction.has_pop_headroom(100));
    }

    #[test]
    fn test_faction_defaults() {
        let faction = Faction::default();
        assert_eq!(faction.age, 1);
        assert!(faction.research.iter().all(|slot| slot.tech.is_none()));
        assert!(!faction.has_tech(TechId(3)));
    }
}
