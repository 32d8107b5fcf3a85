//! Combat: damage resolution, attack timing and projectiles.
//!
//! Damage is subtractive per damage type. For every type whose offense
//! multiplier is positive, the permille-scaled base damage minus the
//! target's armor for that type is floored at zero; the hit deals the sum.
//! Buildings carry no armor.
//!
//! An attack moves through three phases:
//!
//! 1. **Windup** - the unit has picked a target and waits `windup_ms`.
//!    Losing the target, the target leaving range, or an order change
//!    that forbids the engagement cancels it cleanly. No cooldown is spent.
//! 2. **Commit** - cooldown starts. A ranged attack spawns a projectile, a
//!    delayed melee attack arms its impact timer, anything else hits now.
//! 3. **Impact** - a committed impact lands even if the order was cancelled
//!    in the meantime, as long as the target is still alive.
//!
//! Units reduced to zero HP are collected during the step and destroyed
//! afterwards in hit order, so iteration indices stay stable.

use tracing::trace;

use crate::components::{DamageType, EntityId, OrderType, Projectile, UnitTypeId};
use crate::data::{AttackStats, DamageTable, PERMILLE};
use crate::events::DamageEvent;
use crate::factions::FactionId;
use crate::math::{distance_squared, step_toward, TILE_SIZE};
use crate::simulation::{Simulator, MS_PER_TICK};

/// A projectile that reaches its aim point hits a target this close to it,
/// plus the target's own reach.
pub const PROJECTILE_HIT_RADIUS: i32 = 500;

/// Lifetime of projectiles whose profile leaves it unset.
pub const DEFAULT_PROJECTILE_LIFETIME_MS: i32 = 5000;

/// Result of resolving one hit against a target's armor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    /// HP removed from the target.
    pub amount: i32,
    /// Damage type with the largest multiplier.
    pub primary: DamageType,
}

/// Resolve a hit of `base` damage.
///
/// `offense` holds permille multipliers, `armor` flat reductions. Types
/// with a non-positive multiplier contribute nothing. The primary type is
/// the one with the largest multiplier; ties go to the earlier entry of
/// [`DamageType::ALL`].
///
/// # Example
///
/// ```
/// use frontier_core::combat::resolve_damage;
/// use frontier_core::components::DamageType;
/// use frontier_core::data::DamageTable;
///
/// let offense = DamageTable::new(500, 1500, 0, 0);
/// let armor = DamageTable::new(2, 10, 0, 0);
/// let outcome = resolve_damage(10, &offense, &armor);
/// // melee: 5 - 2 = 3, pierce: 15 - 10 = 5
/// assert_eq!(outcome.amount, 8);
/// assert_eq!(outcome.primary, DamageType::Pierce);
/// ```
#[must_use]
pub fn resolve_damage(base: i32, offense: &DamageTable, armor: &DamageTable) -> DamageOutcome {
    let mut total = 0i64;
    let mut primary = DamageType::Melee;
    let mut best = 0;
    for damage_type in DamageType::ALL {
        let multiplier = offense.get(damage_type);
        if multiplier <= 0 {
            continue;
        }
        if multiplier > best {
            best = multiplier;
            primary = damage_type;
        }
        let raw = i64::from(base) * i64::from(multiplier) / i64::from(PERMILLE);
        total += (raw - i64::from(armor.get(damage_type))).max(0);
    }
    DamageOutcome {
        amount: total.min(i64::from(i32::MAX)) as i32,
        primary,
    }
}

/// Deaths collected during a combat step.
#[derive(Debug, Default)]
struct Casualties {
    units: Vec<EntityId>,
    buildings: Vec<EntityId>,
}

impl Casualties {
    fn is_empty(&self) -> bool {
        self.units.is_empty() && self.buildings.is_empty()
    }
}

impl Simulator {
    /// Advance projectiles, then every unit's attack state machine.
    pub(crate) fn combat_step(&mut self) {
        let mut casualties = Casualties::default();
        self.projectile_step(&mut casualties);
        for index in 0..self.world.units.len() {
            self.unit_attack_step(index, &mut casualties);
        }
        self.resolve_casualties(casualties);
    }

    // ========================================================================
    // Target queries
    // ========================================================================

    /// Position and reach of a live target, whatever its faction.
    ///
    /// Units have zero reach; buildings reach half their larger footprint
    /// side from their center.
    fn live_target_position(&self, target: EntityId) -> Option<(FactionId, i32, i32, i32)> {
        if let Some(unit) = self.world.unit(target) {
            return (unit.hp > 0).then_some((unit.faction, unit.x, unit.y, 0));
        }
        let building = self.world.building(target)?;
        if building.hp <= 0 {
            return None;
        }
        let (cx, cy) = building.center();
        let reach = building.footprint_w.max(building.footprint_h) * TILE_SIZE / 2;
        Some((building.faction, cx, cy, reach))
    }

    /// Position and reach of `target` if it is alive and not owned by `faction`.
    pub(crate) fn hostile_target_position(&self, faction: FactionId, target: EntityId) -> Option<(i32, i32, i32)> {
        self.live_target_position(target)
            .filter(|(owner, ..)| *owner != faction)
            .map(|(_, x, y, reach)| (x, y, reach))
    }

    /// Nearest live hostile unit within `range`, ties broken by lower id.
    ///
    /// The grid was bucketed before this tick's movement, so the query is
    /// widened by one tick of the fastest travel and filtered on current
    /// positions.
    pub(crate) fn nearest_hostile_unit(&self, index: usize, range: i32) -> Option<EntityId> {
        let units = &self.world.units;
        let unit = &units[index];
        let limit = i64::from(range) * i64::from(range);
        let drift = i64::from(self.unit_types.max_speed()) * i64::from(MS_PER_TICK) / 1000;
        let radius = (i64::from(range) + drift).min(i64::from(i32::MAX / 4)) as i32;
        let mut best: Option<(i64, EntityId)> = None;
        for other in self.spatial.query(unit.x, unit.y, radius) {
            let Some(candidate) = units.get(other) else {
                continue;
            };
            if candidate.hp <= 0 || candidate.faction == unit.faction {
                continue;
            }
            let d2 = distance_squared(unit.x, unit.y, candidate.x, candidate.y);
            if d2 > limit {
                continue;
            }
            let key = (d2, candidate.id);
            if best.map_or(true, |current| key < current) {
                best = Some(key);
            }
        }
        best.map(|(_, id)| id)
    }

    fn in_attack_range(&self, index: usize, range: i32, target: (i32, i32, i32)) -> bool {
        let unit = &self.world.units[index];
        let (tx, ty, reach) = target;
        let reach = i64::from(range) + i64::from(reach);
        distance_squared(unit.x, unit.y, tx, ty) <= reach * reach
    }

    /// Whether the active order lets a unit pick its own targets.
    fn may_auto_acquire(&self, index: usize) -> bool {
        let unit = &self.world.units[index];
        match unit.current_order {
            OrderType::Idle => !unit.has_move_target,
            OrderType::AttackMove => true,
            OrderType::Attack => unit
                .attack_target
                .and_then(|t| self.hostile_target_position(unit.faction, t))
                .is_none(),
            OrderType::Move | OrderType::Gather => false,
        }
    }

    /// Target to start an attack on this tick, if any.
    fn select_attack_target(&self, index: usize, range: i32) -> Option<EntityId> {
        let unit = &self.world.units[index];
        if unit.current_order == OrderType::Attack {
            if let Some(target) = unit.attack_target {
                if let Some(position) = self.hostile_target_position(unit.faction, target) {
                    return self.in_attack_range(index, range, position).then_some(target);
                }
            }
        }
        if !self.may_auto_acquire(index) {
            return None;
        }
        self.nearest_hostile_unit(index, range)
    }

    /// Whether a windup against `target` may continue.
    fn can_engage(&self, index: usize, target: EntityId, range: i32) -> bool {
        let unit = &self.world.units[index];
        let Some(position) = self.hostile_target_position(unit.faction, target) else {
            return false;
        };
        let explicit = unit.current_order == OrderType::Attack && unit.attack_target == Some(target);
        (explicit || self.may_auto_acquire(index)) && self.in_attack_range(index, range, position)
    }

    // ========================================================================
    // Projectiles
    // ========================================================================

    fn projectile_step(&mut self, casualties: &mut Casualties) {
        let in_flight = std::mem::take(&mut self.world.projectiles);
        let mut kept = Vec::with_capacity(in_flight.len());
        for mut projectile in in_flight {
            projectile.lifetime_remaining_ms -= MS_PER_TICK;
            let target = self.live_target_position(projectile.target);
            if projectile.homing {
                if let Some((_, tx, ty, _)) = target {
                    projectile.aim_x = tx;
                    projectile.aim_y = ty;
                }
            }

            let step = (i64::from(projectile.speed) * i64::from(MS_PER_TICK) / 1000).clamp(1, i64::from(i32::MAX)) as i32;
            let (x, y, arrived) = step_toward(projectile.x, projectile.y, projectile.aim_x, projectile.aim_y, step);
            projectile.x = x;
            projectile.y = y;

            if arrived {
                if let Some((_, tx, ty, reach)) = target {
                    let radius = i64::from(PROJECTILE_HIT_RADIUS) + i64::from(reach);
                    if distance_squared(x, y, tx, ty) <= radius * radius {
                        self.apply_hit(
                            projectile.attacker,
                            projectile.source_type,
                            projectile.damage,
                            projectile.target,
                            casualties,
                        );
                    }
                }
                continue;
            }
            if projectile.lifetime_remaining_ms <= 0 {
                trace!(id = %projectile.id, "projectile expired");
                continue;
            }
            kept.push(projectile);
        }
        self.world.projectiles = kept;
    }

    // ========================================================================
    // Attack state machine
    // ========================================================================

    fn unit_attack_step(&mut self, index: usize, casualties: &mut Casualties) {
        let unit = &self.world.units[index];
        if unit.hp <= 0 {
            return;
        }
        let Some(attack) = self
            .unit_types
            .get(unit.type_id)
            .filter(|t| t.is_combatant())
            .map(|t| t.attack)
        else {
            return;
        };

        let unit = &mut self.world.units[index];
        unit.attack_cooldown_ms = (unit.attack_cooldown_ms - MS_PER_TICK).max(0);

        // A committed impact blocks new attacks until it lands.
        if unit.impact_remaining_ms > 0 {
            unit.impact_remaining_ms -= MS_PER_TICK;
            if unit.impact_remaining_ms > 0 {
                return;
            }
            unit.impact_remaining_ms = 0;
            let (attacker, source_type) = (unit.id, unit.type_id);
            if let Some(target) = unit.pending_attack_target.take() {
                if self.live_target_position(target).is_some() {
                    self.apply_hit(attacker, source_type, attack.damage, target, casualties);
                }
            }
            return;
        }

        if unit.attack_windup_remaining_ms > 0 {
            let pending = unit.pending_attack_target;
            match pending.filter(|&t| self.can_engage(index, t, attack.range)) {
                Some(target) => {
                    let unit = &mut self.world.units[index];
                    unit.attack_windup_remaining_ms -= MS_PER_TICK;
                    if unit.attack_windup_remaining_ms <= 0 {
                        self.commit_attack(index, target, &attack, casualties);
                    }
                }
                None => {
                    let unit = &mut self.world.units[index];
                    trace!(unit = %unit.id, "windup cancelled");
                    unit.attack_windup_remaining_ms = 0;
                    unit.pending_attack_target = None;
                }
            }
            return;
        }

        if unit.attack_cooldown_ms > 0 {
            return;
        }
        let Some(target) = self.select_attack_target(index, attack.range) else {
            return;
        };
        if attack.windup_ms > 0 {
            let unit = &mut self.world.units[index];
            unit.attack_windup_remaining_ms = attack.windup_ms;
            unit.pending_attack_target = Some(target);
        } else {
            self.commit_attack(index, target, &attack, casualties);
        }
    }

    fn commit_attack(&mut self, index: usize, target: EntityId, attack: &AttackStats, casualties: &mut Casualties) {
        let unit = &mut self.world.units[index];
        unit.attack_cooldown_ms = attack.cooldown_ms.max(0);
        unit.attack_windup_remaining_ms = 0;
        unit.pending_attack_target = None;
        let (attacker, source_type, faction, x, y) = (unit.id, unit.type_id, unit.faction, unit.x, unit.y);

        if let Some(profile) = attack.projectile {
            let Some((aim_x, aim_y, _)) = self.hostile_target_position(faction, target) else {
                return;
            };
            let primary = self
                .unit_types
                .get(source_type)
                .map_or(DamageType::Melee, |t| {
                    resolve_damage(attack.damage, &t.effective_offense(), &DamageTable::default()).primary
                });
            let id = self.world.alloc_id();
            self.world.projectiles.push(Projectile {
                id,
                x,
                y,
                target,
                source_type,
                faction,
                speed: profile.speed,
                damage: attack.damage,
                damage_type: primary,
                lifetime_remaining_ms: if profile.lifetime_ms > 0 {
                    profile.lifetime_ms
                } else {
                    DEFAULT_PROJECTILE_LIFETIME_MS
                },
                attacker,
                homing: profile.homing,
                aim_x,
                aim_y,
            });
        } else if attack.impact_delay_ms > 0 {
            let unit = &mut self.world.units[index];
            unit.impact_remaining_ms = attack.impact_delay_ms;
            unit.pending_attack_target = Some(target);
        } else {
            self.apply_hit(attacker, source_type, attack.damage, target, casualties);
        }
    }

    /// Apply one hit to a live unit or building and record it.
    fn apply_hit(
        &mut self,
        attacker: EntityId,
        source_type: UnitTypeId,
        base: i32,
        target: EntityId,
        casualties: &mut Casualties,
    ) {
        let offense = self
            .unit_types
            .get(source_type)
            .map_or(DamageTable::new(PERMILLE, 0, 0, 0), |t| t.effective_offense());
        let tick = self.world.tick;

        let (outcome, x, y, killed) = if let Some(index) = self.world.unit_index(target) {
            let armor = self
                .unit_types
                .get(self.world.units[index].type_id)
                .map(|t| t.armor)
                .unwrap_or_default();
            let outcome = resolve_damage(base, &offense, &armor);
            let unit = &mut self.world.units[index];
            if unit.hp <= 0 {
                return;
            }
            unit.hp -= outcome.amount;
            let killed = unit.hp <= 0;
            if killed {
                casualties.units.push(target);
            }
            (outcome, unit.x, unit.y, killed)
        } else if let Some(index) = self.world.building_index(target) {
            let outcome = resolve_damage(base, &offense, &DamageTable::default());
            let building = &mut self.world.buildings[index];
            if building.hp <= 0 {
                return;
            }
            building.hp -= outcome.amount;
            let killed = building.hp <= 0;
            if killed {
                casualties.buildings.push(target);
            }
            let (x, y) = building.center();
            (outcome, x, y, killed)
        } else {
            return;
        };

        self.events.push_damage(DamageEvent {
            tick,
            attacker,
            target,
            amount: outcome.amount,
            damage_type: outcome.primary,
            x,
            y,
            killed,
        });
    }

    fn resolve_casualties(&mut self, casualties: Casualties) {
        if casualties.is_empty() {
            return;
        }
        for id in casualties.units {
            if let Err(err) = self.destroy_unit(id) {
                trace!(%id, %err, "casualty already removed");
            }
        }
        for id in casualties.buildings {
            if let Err(err) = self.destroy_building(id) {
                trace!(%id, %err, "casualty already removed");
            }
        }
        self.evaluate_win_loss();
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::components::UnitTypeId;
    use crate::config::SimConfig;
    use crate::data::{BuildingData, ContentRegistry, ProjectileStats, UnitData};
    use crate::events::SimEventKind;
    use crate::factions::FactionId;

    fn sim() -> Simulator {
        Simulator::new(SimConfig {
            map_width: 64,
            map_height: 64,
            ..SimConfig::default()
        })
    }

    fn dummy(sim: &mut Simulator, hp: i32, armor: DamageTable) -> UnitTypeId {
        sim.register_unit_type(UnitData {
            id: "dummy".to_string(),
            max_hp: hp,
            armor,
            ..UnitData::default()
        })
        .unwrap()
    }

    fn fighter(sim: &mut Simulator, attack: AttackStats) -> UnitTypeId {
        sim.register_unit_type(UnitData {
            id: "fighter".to_string(),
            speed: 3000,
            max_hp: 60,
            attack,
            ..UnitData::default()
        })
        .unwrap()
    }

    fn melee(damage: i32) -> AttackStats {
        AttackStats {
            damage,
            range: 1500,
            cooldown_ms: 1000,
            ..AttackStats::default()
        }
    }

    #[test]
    fn test_resolve_damage_is_subtractive_per_type() {
        let outcome = resolve_damage(10, &DamageTable::new(1000, 0, 0, 0), &DamageTable::new(3, 50, 0, 0));
        assert_eq!(outcome.amount, 7);
        assert_eq!(outcome.primary, DamageType::Melee);

        let outcome = resolve_damage(10, &DamageTable::new(1000, 1000, 0, 0), &DamageTable::new(20, 4, 0, 0));
        assert_eq!(outcome.amount, 6);
        assert_eq!(outcome.primary, DamageType::Melee);

        let outcome = resolve_damage(10, &DamageTable::new(0, 0, 2000, 0), &DamageTable::new(0, 0, 0, 0));
        assert_eq!(outcome.amount, 20);
        assert_eq!(outcome.primary, DamageType::Siege);
    }

    #[test]
    fn test_resolve_damage_never_heals() {
        let outcome = resolve_damage(5, &DamageTable::new(1000, 0, 0, 0), &DamageTable::new(100, 0, 0, 0));
        assert_eq!(outcome.amount, 0);
        assert_eq!(resolve_damage(-5, &DamageTable::new(1000, 0, 0, 0), &DamageTable::default()).amount, 0);
    }

    #[test]
    fn test_melee_kill_emits_events_and_defeat() {
        let mut sim = sim();
        let target_type = dummy(&mut sim, 10, DamageTable::default());
        let soldier = fighter(&mut sim, melee(8));
        let attacker = sim.spawn_unit(soldier, FactionId(0), 1000, 1000, 0).unwrap();
        let target = sim.spawn_unit(target_type, FactionId(1), 2000, 1000, 0).unwrap();

        sim.tick();
        assert_eq!(sim.world().unit(target).unwrap().hp, 2);
        sim.run_ticks(19);
        assert_eq!(sim.world().unit(target).unwrap().hp, 2);
        sim.tick();
        assert!(sim.world().unit(target).is_none());

        let damage = sim.drain_damage_events();
        assert_eq!(damage.len(), 2);
        assert!(damage.iter().all(|d| d.attacker == attacker && d.target == target));
        assert!(damage[1].killed);
        let events = sim.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e.kind, SimEventKind::UnitDied { unit, .. } if unit == target)));
        assert!(events
            .iter()
            .any(|e| matches!(e.kind, SimEventKind::Victory { faction } if faction == FactionId(0))));
    }

    #[test]
    fn test_simultaneous_kill_dies_once() {
        let mut sim = sim();
        let target_type = dummy(&mut sim, 10, DamageTable::default());
        let soldier = fighter(&mut sim, melee(8));
        sim.spawn_unit(soldier, FactionId(0), 1000, 1000, 0).unwrap();
        sim.spawn_unit(soldier, FactionId(0), 1000, 1400, 0).unwrap();
        let target = sim.spawn_unit(target_type, FactionId(1), 2000, 1200, 0).unwrap();

        sim.tick();
        let deaths = sim
            .drain_events()
            .iter()
            .filter(|e| matches!(e.kind, SimEventKind::UnitDied { .. }))
            .count();
        assert_eq!(deaths, 1);
        assert_eq!(sim.drain_damage_events().len(), 2);
        assert!(sim.world().unit(target).is_none());
    }

    #[test]
    fn test_projectile_resolves_on_arrival() {
        let mut sim = sim();
        let target_type = dummy(&mut sim, 40, DamageTable::new(0, 1, 0, 0));
        let archer = sim
            .register_unit_type(UnitData {
                id: "archer".to_string(),
                max_hp: 30,
                attack: AttackStats {
                    damage: 6,
                    range: 5000,
                    cooldown_ms: 5000,
                    projectile: Some(ProjectileStats {
                        speed: 10_000,
                        lifetime_ms: 2000,
                        homing: false,
                    }),
                    ..AttackStats::default()
                },
                offense: DamageTable::new(0, 1000, 0, 0),
                ..UnitData::default()
            })
            .unwrap();
        sim.spawn_unit(archer, FactionId(0), 1000, 1000, 0).unwrap();
        let target = sim.spawn_unit(target_type, FactionId(1), 4000, 1000, 0).unwrap();

        sim.tick();
        assert_eq!(sim.world().projectiles.len(), 1);
        assert_eq!(sim.world().projectiles[0].damage_type, DamageType::Pierce);
        sim.run_ticks(5);
        assert_eq!(sim.world().unit(target).unwrap().hp, 40);
        sim.tick();
        assert!(sim.world().projectiles.is_empty());
        assert_eq!(sim.world().unit(target).unwrap().hp, 35);
        let damage = sim.drain_damage_events();
        assert_eq!(damage.len(), 1);
        assert_eq!(damage[0].damage_type, DamageType::Pierce);
        assert_eq!(damage[0].amount, 5);
    }

    #[test]
    fn test_projectile_expires_without_damage() {
        let mut sim = sim();
        let target_type = dummy(&mut sim, 40, DamageTable::default());
        let slinger = fighter(
            &mut sim,
            AttackStats {
                damage: 6,
                range: 5000,
                cooldown_ms: 10_000,
                projectile: Some(ProjectileStats {
                    speed: 1000,
                    lifetime_ms: 100,
                    homing: true,
                }),
                ..AttackStats::default()
            },
        );
        sim.spawn_unit(slinger, FactionId(0), 1000, 1000, 0).unwrap();
        let target = sim.spawn_unit(target_type, FactionId(1), 4000, 1000, 0).unwrap();
        sim.run_ticks(2);
        assert_eq!(sim.world().projectiles.len(), 1);
        sim.tick();
        assert!(sim.world().projectiles.is_empty());
        assert_eq!(sim.world().unit(target).unwrap().hp, 40);
    }

    #[test]
    fn test_leaving_during_windup_cancels_cleanly() {
        let mut sim = sim();
        let target_type = dummy(&mut sim, 50, DamageTable::default());
        let lancer = fighter(
            &mut sim,
            AttackStats {
                windup_ms: 200,
                ..melee(10)
            },
        );
        let attacker = sim.spawn_unit(lancer, FactionId(0), 1000, 1000, 0).unwrap();
        let target = sim.spawn_unit(target_type, FactionId(1), 2000, 1000, 0).unwrap();

        sim.tick();
        assert_eq!(sim.world().unit(attacker).unwrap().pending_attack_target, Some(target));
        sim.issue_move(attacker, 40_000, 1000);
        sim.run_ticks(40);

        assert_eq!(sim.world().unit(target).unwrap().hp, 50);
        assert!(sim.drain_damage_events().is_empty());
        let unit = sim.world().unit(attacker).unwrap();
        assert_eq!(unit.attack_windup_remaining_ms, 0);
        assert_eq!(unit.attack_cooldown_ms, 0);
    }

    #[test]
    fn test_committed_impact_lands_after_stop() {
        let mut sim = sim();
        let target_type = dummy(&mut sim, 50, DamageTable::default());
        let brute = fighter(
            &mut sim,
            AttackStats {
                impact_delay_ms: 300,
                cooldown_ms: 2000,
                ..melee(10)
            },
        );
        let attacker = sim.spawn_unit(brute, FactionId(0), 1000, 1000, 0).unwrap();
        let target = sim.spawn_unit(target_type, FactionId(1), 2000, 1000, 0).unwrap();

        sim.tick();
        assert_eq!(sim.world().unit(attacker).unwrap().impact_remaining_ms, 300);
        sim.issue_stop(attacker);
        sim.run_ticks(5);
        assert_eq!(sim.world().unit(target).unwrap().hp, 50);
        sim.tick();
        assert_eq!(sim.world().unit(target).unwrap().hp, 40);
        sim.run_ticks(10);
        assert_eq!(sim.drain_damage_events().len(), 1);
    }

    #[test]
    fn test_explicit_attack_on_building_uses_reach() {
        let content = ContentRegistry {
            buildings: vec![BuildingData {
                id: "palisade".to_string(),
                max_hp: 20,
                footprint_w: 2,
                footprint_h: 2,
                ..BuildingData::default()
            }],
            ..ContentRegistry::default()
        };
        let mut sim = Simulator::with_content(
            SimConfig {
                map_width: 32,
                map_height: 32,
                ..SimConfig::default()
            },
            content,
        );
        let soldier = fighter(&mut sim, melee(8));
        let attacker = sim.spawn_unit(soldier, FactionId(0), 6000, 3500, 0).unwrap();
        let wall = sim
            .spawn_building(crate::components::BuildingTypeId(0), FactionId(1), 5000, 5000)
            .unwrap();
        sim.issue_attack(attacker, wall);
        sim.run_ticks(60);

        assert!(sim.world().building(wall).is_none());
        assert_eq!(sim.world().unit(attacker).unwrap().current_order, OrderType::Idle);
        assert!(sim.nav_grid().is_walkable(5, 5));
        let events = sim.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e.kind, SimEventKind::BuildingDestroyed { building, .. } if building == wall)));
        assert_eq!(sim.drain_damage_events().len(), 3);
    }

    #[test]
    fn test_auto_acquire_prefers_nearest() {
        let mut sim = sim();
        let target_type = dummy(&mut sim, 50, DamageTable::default());
        let soldier = fighter(&mut sim, melee(8));
        sim.spawn_unit(soldier, FactionId(0), 5000, 5000, 0).unwrap();
        let far = sim.spawn_unit(target_type, FactionId(1), 6200, 5000, 0).unwrap();
        let near = sim.spawn_unit(target_type, FactionId(1), 5000, 5900, 0).unwrap();
        sim.tick();
        assert_eq!(sim.world().unit(near).unwrap().hp, 42);
        assert_eq!(sim.world().unit(far).unwrap().hp, 50);
    }

    #[test]
    fn test_auto_acquire_sees_unit_that_crossed_buckets_this_tick() {
        let mut sim = sim();
        let soldier = fighter(&mut sim, melee(8));
        let sprinter = sim
            .register_unit_type(UnitData {
                id: "sprinter".to_string(),
                speed: 60_000,
                max_hp: 50,
                ..UnitData::default()
            })
            .unwrap();
        sim.spawn_unit(soldier, FactionId(0), 5000, 5000, 0).unwrap();
        // Bucketed two cells east; one step lands it inside melee range.
        let runner = sim.spawn_unit(sprinter, FactionId(1), 8100, 5000, 0).unwrap();
        sim.issue_move(runner, 6000, 5000);
        sim.tick();
        let hit = sim.world().unit(runner).unwrap();
        assert_eq!((hit.x, hit.y), (6000, 5000));
        assert_eq!(hit.hp, 42);
    }

    proptest! {
        #[test]
        fn prop_damage_non_negative_and_armor_monotone(
            base in -100i32..10_000,
            offense in proptest::array::uniform4(-500i32..3000),
            armor in proptest::array::uniform4(-50i32..500),
            extra in 0i32..200,
        ) {
            let offense = DamageTable::new(offense[0], offense[1], offense[2], offense[3]);
            let armor_table = DamageTable::new(armor[0], armor[1], armor[2], armor[3]);
            let heavier = DamageTable::new(armor[0] + extra, armor[1] + extra, armor[2] + extra, armor[3] + extra);
            let light = resolve_damage(base, &offense, &armor_table);
            let heavy = resolve_damage(base, &offense, &heavier);
            prop_assert!(light.amount >= 0);
            prop_assert!(heavy.amount <= light.amount);
            prop_assert_eq!(light.primary, heavy.primary);
        }
    }
}
