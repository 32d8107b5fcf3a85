//! Technology research and its effects.
//!
//! Research runs in a faction's fixed slots. Completing a tech sets its bit
//! in the faction mask and applies its effects. Stat effects rewrite the
//! shared unit type table, so they reach every faction's units of the
//! affected types.

use tracing::{debug, warn};

use crate::components::TechId;
use crate::data::{TechEffect, UnitData};
use crate::error::{GameError, Result};
use crate::events::SimEventKind;
use crate::factions::{FactionId, ResearchSlot};
use crate::math::scale_by;
use crate::simulation::{Simulator, MS_PER_TICK};

impl Simulator {
    /// Start researching a tech.
    ///
    /// Checks, in order: faction, tech definition, not already researched
    /// or in progress, faction age, prerequisites, a free slot and cost.
    /// Unknown prerequisite ids count as unmet. Nothing changes on failure.
    pub fn start_research(&mut self, tech: TechId, faction: FactionId) -> Result<()> {
        let state = self.faction_mut(faction)?.clone();
        let data = self.content.tech(tech).ok_or(GameError::UnknownTech(tech))?;
        if state.has_tech(tech) || state.is_researching(tech) {
            return Err(GameError::AlreadyResearched(tech));
        }
        if data.age > state.age {
            return Err(GameError::TechRequirementNotMet(format!(
                "{} requires age {} (faction is at age {})",
                data.id, data.age, state.age
            )));
        }
        for prerequisite in &data.prerequisites {
            let met = self
                .content
                .tech_index(prerequisite)
                .is_some_and(|id| state.has_tech(id));
            if !met {
                return Err(GameError::TechRequirementNotMet(format!(
                    "{} requires {prerequisite}",
                    data.id
                )));
            }
        }
        let slot = state
            .research
            .iter()
            .position(|s| s.tech.is_none())
            .ok_or(GameError::NoResearchSlot(faction))?;
        state.resources.check_afford(&data.cost)?;

        let cost = data.cost;
        let time = data.research_time_ms.max(MS_PER_TICK);
        let entry = &mut self.world.factions[faction.index()];
        entry.resources.deduct(&cost);
        entry.research[slot] = ResearchSlot {
            tech: Some(tech),
            remaining_ms: time,
            total_ms: time,
        };
        debug!(%tech, %faction, "research started");
        Ok(())
    }

    /// Abort research of a tech and refund its cost.
    pub fn cancel_research(&mut self, tech: TechId, faction: FactionId) -> Result<()> {
        let entry = self.faction_mut(faction)?;
        let slot = entry
            .research
            .iter_mut()
            .find(|s| s.tech == Some(tech))
            .ok_or_else(|| GameError::InvalidState(format!("{tech} is not being researched by {faction}")))?;
        *slot = ResearchSlot::default();
        let refund = self.content.tech(tech).map(|t| t.cost).unwrap_or_default();
        self.world.factions[faction.index()].resources.add(&refund);
        debug!(%tech, %faction, "research cancelled");
        Ok(())
    }

    /// Advance research slots, factions in index order, slots in order.
    pub(crate) fn research_step(&mut self) {
        let tick = self.world.tick;
        for faction_index in 0..self.world.factions.len() {
            for slot_index in 0..self.world.factions[faction_index].research.len() {
                let slot = &mut self.world.factions[faction_index].research[slot_index];
                let Some(tech) = slot.tech else {
                    continue;
                };
                slot.remaining_ms -= MS_PER_TICK;
                if slot.remaining_ms > 0 {
                    continue;
                }
                *slot = ResearchSlot::default();

                let faction = FactionId(faction_index as u8);
                match tech.flag() {
                    Some(bit) => self.world.factions[faction_index].tech_flags |= bit,
                    None => warn!(%tech, "tech index has no flag bit"),
                }
                self.apply_tech_effects(tech, faction);
                self.events.push(tick, SimEventKind::ResearchComplete { faction, tech });
                debug!(%tech, %faction, tick, "research complete");
            }
        }
    }

    fn apply_tech_effects(&mut self, tech: TechId, faction: FactionId) {
        let Some(data) = self.content.tech(tech) else {
            return;
        };
        for effect in data.effects.clone() {
            match effect {
                TechEffect::UnlockAge { age } => {
                    let entry = &mut self.world.factions[faction.index()];
                    entry.age = entry.age.max(age);
                }
                TechEffect::GatherRateMul { factor } => self.modify_workers(|t| {
                    for rate in t.gather.rates_mut() {
                        *rate = scale_by(*rate, factor);
                    }
                }),
                TechEffect::GatherRateAdd { amount } => self.modify_workers(|t| {
                    for rate in t.gather.rates_mut() {
                        if *rate > 0 {
                            *rate += amount;
                        }
                    }
                }),
                TechEffect::ArmorAdd { amount } => self.unit_types.modify_all(|t| {
                    t.armor.melee += amount;
                    t.armor.pierce += amount;
                }),
                TechEffect::ArmorMul { factor } => self.unit_types.modify_all(|t| {
                    t.armor.melee = scale_by(t.armor.melee, factor);
                    t.armor.pierce = scale_by(t.armor.pierce, factor);
                }),
                TechEffect::AttackMul { factor } => self.unit_types.modify_all(|t| {
                    if t.attack.damage > 0 {
                        t.attack.damage = scale_by(t.attack.damage, factor);
                    }
                }),
                TechEffect::AttackAdd { amount } => self.unit_types.modify_all(|t| {
                    if t.attack.damage > 0 {
                        t.attack.damage += amount;
                    }
                }),
            }
        }
    }

    fn modify_workers(&mut self, mut f: impl FnMut(&mut UnitData)) {
        self.unit_types.modify_all(|t| {
            if t.is_worker {
                f(t);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitTypeId;
    use crate::config::SimConfig;
    use crate::data::{AttackStats, ContentRegistry, DamageTable, GatherStats, TechData};
    use crate::factions::ResourceStock;
    use crate::math::Fixed;

    fn tech(id: &str, time: i32, effects: Vec<TechEffect>) -> TechData {
        TechData {
            id: id.to_string(),
            cost: ResourceStock::new(100, 0, 0, 0),
            research_time_ms: time,
            effects,
            ..TechData::default()
        }
    }

    fn setup() -> Simulator {
        let content = ContentRegistry {
            units: vec![
                UnitData {
                    id: "villager".to_string(),
                    is_worker: true,
                    gather: GatherStats {
                        average_rate: 2000,
                        wood_rate: 0,
                        food_rate: 1000,
                        carry_capacity: 10,
                        ..GatherStats::default()
                    },
                    ..UnitData::default()
                },
                UnitData {
                    id: "spearman".to_string(),
                    attack: AttackStats {
                        damage: 8,
                        ..AttackStats::default()
                    },
                    armor: DamageTable::new(2, 1, 0, 0),
                    ..UnitData::default()
                },
            ],
            techs: vec![
                tech("feudal_age", 100, vec![TechEffect::UnlockAge { age: 2 }]),
                TechData {
                    age: 2,
                    prerequisites: vec!["feudal_age".to_string()],
                    ..tech(
                        "wheelbarrow",
                        100,
                        vec![
                            TechEffect::GatherRateMul {
                                factor: Fixed::from_num(5) / Fixed::from_num(4),
                            },
                            TechEffect::GatherRateAdd { amount: 100 },
                        ],
                    )
                },
                tech(
                    "forging",
                    50,
                    vec![
                        TechEffect::AttackAdd { amount: 2 },
                        TechEffect::ArmorAdd { amount: 1 },
                        TechEffect::ArmorMul {
                            factor: Fixed::from_num(2),
                        },
                    ],
                ),
                TechData {
                    prerequisites: vec!["missing".to_string()],
                    ..tech("orphan", 50, Vec::new())
                },
            ],
            ..ContentRegistry::default()
        };
        let mut sim = Simulator::with_content(SimConfig::default(), content);
        sim.set_faction_resources(FactionId(0), ResourceStock::new(1000, 0, 0, 0))
            .unwrap();
        sim
    }

    #[test]
    fn test_prerequisites_and_age_gate() {
        let mut sim = setup();
        let before = sim.faction(FactionId(0)).unwrap().clone();
        assert!(matches!(
            sim.start_research(TechId(1), FactionId(0)),
            Err(GameError::TechRequirementNotMet(_))
        ));
        assert!(matches!(
            sim.start_research(TechId(3), FactionId(0)),
            Err(GameError::TechRequirementNotMet(_))
        ));
        assert!(matches!(
            sim.start_research(TechId(9), FactionId(0)),
            Err(GameError::UnknownTech(_))
        ));
        assert_eq!(sim.faction(FactionId(0)).unwrap(), &before);

        sim.start_research(TechId(0), FactionId(0)).unwrap();
        assert!(matches!(
            sim.start_research(TechId(0), FactionId(0)),
            Err(GameError::AlreadyResearched(_))
        ));
        sim.run_ticks(2);
        let faction = sim.faction(FactionId(0)).unwrap();
        assert!(faction.has_tech(TechId(0)));
        assert_eq!(faction.age, 2);
        assert!(sim.drain_events().iter().any(|e| matches!(
            e.kind,
            SimEventKind::ResearchComplete { tech, .. } if tech == TechId(0)
        )));

        sim.start_research(TechId(1), FactionId(0)).unwrap();
        assert!(matches!(
            sim.start_research(TechId(0), FactionId(0)),
            Err(GameError::AlreadyResearched(_))
        ));
    }

    #[test]
    fn test_gather_effects_touch_workers_only() {
        let mut sim = setup();
        sim.world.factions[0].tech_flags = 1;
        sim.world.factions[0].age = 2;
        let version = sim.unit_types().version();
        sim.start_research(TechId(1), FactionId(0)).unwrap();
        sim.run_ticks(2);
        let villager = sim.unit_types().get(UnitTypeId(0)).unwrap();
        assert_eq!(villager.gather.average_rate, 2600);
        assert_eq!(villager.gather.food_rate, 1350);
        assert_eq!(villager.gather.wood_rate, 0);
        assert_eq!(sim.unit_types().version(), version + 2);
    }

    #[test]
    fn test_combat_effects_apply_in_order() {
        let mut sim = setup();
        sim.start_research(TechId(2), FactionId(0)).unwrap();
        sim.tick();
        let spearman = sim.unit_types().get(UnitTypeId(1)).unwrap();
        assert_eq!(spearman.attack.damage, 10);
        assert_eq!(spearman.armor, DamageTable::new(6, 4, 0, 0));
        let villager = sim.unit_types().get(UnitTypeId(0)).unwrap();
        assert_eq!(villager.attack.damage, 0);
        assert_eq!(villager.armor, DamageTable::new(2, 2, 0, 0));
    }

    #[test]
    fn test_slots_and_cancel_refund() {
        let mut sim = setup();
        sim.start_research(TechId(0), FactionId(0)).unwrap();
        sim.start_research(TechId(2), FactionId(0)).unwrap();
        sim.world.factions[0].tech_flags = 1;
        sim.world.factions[0].age = 2;
        assert!(matches!(
            sim.start_research(TechId(1), FactionId(0)),
            Err(GameError::NoResearchSlot(_))
        ));
        assert_eq!(sim.faction(FactionId(0)).unwrap().resources.food, 800);
        sim.cancel_research(TechId(2), FactionId(0)).unwrap();
        assert_eq!(sim.faction(FactionId(0)).unwrap().resources.food, 900);
        assert!(matches!(
            sim.cancel_research(TechId(2), FactionId(0)),
            Err(GameError::InvalidState(_))
        ));
        sim.start_research(TechId(1), FactionId(0)).unwrap();
    }
}
