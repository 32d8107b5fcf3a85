//! Drainable logs of domain events and per-hit damage records.
//!
//! Subsystems append during a tick. Presentation drains between ticks; the
//! replay recorder copies the span appended during the tick it records.

use serde::{Deserialize, Serialize};

use crate::components::{BuildingTypeId, DamageType, EntityId, TechId, UnitTypeId};
use crate::factions::{FactionId, ResourceKind};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEventKind {
    /// A unit entered the world.
    UnitSpawned {
        /// New unit.
        unit: EntityId,
        /// Its type.
        unit_type: UnitTypeId,
        /// Its owner.
        faction: FactionId,
    },
    /// A unit was removed.
    UnitDied {
        /// Removed unit.
        unit: EntityId,
        /// Its type.
        unit_type: UnitTypeId,
        /// Its owner.
        faction: FactionId,
    },
    /// A gatherer dropped off cargo.
    ResourceCollected {
        /// Gatherer.
        unit: EntityId,
        /// Resource credited.
        kind: ResourceKind,
        /// Amount credited.
        amount: i32,
        /// Faction credited.
        faction: FactionId,
    },
    /// Construction finished.
    ConstructionComplete {
        /// Finished building.
        building: EntityId,
        /// Owner.
        faction: FactionId,
    },
    /// A building was removed.
    BuildingDestroyed {
        /// Removed building.
        building: EntityId,
        /// Its type.
        building_type: BuildingTypeId,
        /// Its owner.
        faction: FactionId,
    },
    /// A technology finished.
    ResearchComplete {
        /// Researching faction.
        faction: FactionId,
        /// Finished tech.
        tech: TechId,
    },
    /// A faction lost its last entity.
    FactionDefeated {
        /// Defeated faction.
        faction: FactionId,
    },
    /// Only one faction remains.
    Victory {
        /// Winner.
        faction: FactionId,
    },
}

/// A domain event stamped with the tick that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Tick of emission.
    pub tick: u64,
    /// Payload.
    pub kind: SimEventKind,
}

/// One resolved hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Tick of the hit.
    pub tick: u64,
    /// Unit that dealt it.
    pub attacker: EntityId,
    /// Unit or building hit.
    pub target: EntityId,
    /// Damage after armor.
    pub amount: i32,
    /// Primary damage type.
    pub damage_type: DamageType,
    /// Target position x at impact.
    pub x: i32,
    /// Target position y at impact.
    pub y: i32,
    /// Whether the hit reduced the target to zero.
    pub killed: bool,
}

/// Both event buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    sim: Vec<SimEvent>,
    damage: Vec<DamageEvent>,
    tick_sim_start: usize,
    tick_damage_start: usize,
}

impl EventLog {
    /// Append a domain event.
    pub fn push(&mut self, tick: u64, kind: SimEventKind) {
        self.sim.push(SimEvent { tick, kind });
    }

    /// Append a damage record.
    pub fn push_damage(&mut self, event: DamageEvent) {
        self.damage.push(event);
    }

    /// Undrained domain events.
    #[must_use]
    pub fn sim_events(&self) -> &[SimEvent] {
        &self.sim
    }

    /// Undrained damage records.
    #[must_use]
    pub fn damage_events(&self) -> &[DamageEvent] {
        &self.damage
    }

    /// Take every undrained domain event.
    pub fn drain_sim(&mut self) -> Vec<SimEvent> {
        self.tick_sim_start = 0;
        std::mem::take(&mut self.sim)
    }

    /// Take every undrained damage record.
    pub fn drain_damage(&mut self) -> Vec<DamageEvent> {
        self.tick_damage_start = 0;
        std::mem::take(&mut self.damage)
    }

    /// Mark the start of a tick.
    pub(crate) fn begin_tick(&mut self) {
        self.tick_sim_start = self.sim.len();
        self.tick_damage_start = self.damage.len();
    }

    /// Domain events appended since [`Self::begin_tick`].
    #[must_use]
    pub fn tick_sim_events(&self) -> &[SimEvent] {
        &self.sim[self.tick_sim_start.min(self.sim.len())..]
    }

    /// Damage records appended since [`Self::begin_tick`].
    #[must_use]
    pub fn tick_damage_events(&self) -> &[DamageEvent] {
        &self.damage[self.tick_damage_start.min(self.damage.len())..]
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.sim.clear();
        self.damage.clear();
        self.tick_sim_start = 0;
        self.tick_damage_start = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_span_tracks_new_events_only() {
        let mut log = EventLog::default();
        log.push(1, SimEventKind::Victory { faction: FactionId(0) });
        log.begin_tick();
        log.push(
            2,
            SimEventKind::FactionDefeated {
                faction: FactionId(1),
            },
        );
        assert_eq!(log.sim_events().len(), 2);
        assert_eq!(log.tick_sim_events().len(), 1);
        assert_eq!(log.tick_sim_events()[0].tick, 2);
    }

    #[test]
    fn test_drain_empties_buffer() {
        let mut log = EventLog::default();
        log.push(1, SimEventKind::Victory { faction: FactionId(0) });
        log.begin_tick();
        let drained = log.drain_sim();
        assert_eq!(drained.len(), 1);
        assert!(log.sim_events().is_empty());
        assert!(log.tick_sim_events().is_empty());
    }
}
