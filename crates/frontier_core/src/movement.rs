//! Unit movement: attack chase, waypoint following and steering.
//!
//! Displacement per tick is `speed * MS_PER_TICK / 1000` milli-units. A
//! unit whose remaining distance fits in one tick snaps exactly onto its
//! target. Otherwise the step along the integer-normalized direction is
//! blended with the flow field (when it targets the unit's destination
//! tile) and a separation push from nearby units.

use crate::components::OrderType;
use crate::math::{distance_squared, isqrt, tile_center, to_tile};
use crate::simulation::{Simulator, MS_PER_TICK};

/// Neighbors closer than this push each other apart.
pub const SEPARATION_RADIUS: i32 = 800;

/// Summed separation force is divided by this before it is applied.
pub const SEPARATION_DIVISOR: i64 = 400;

/// A waypoint counts as reached within this distance on both axes.
pub const WAYPOINT_TOLERANCE: i32 = 200;

impl Simulator {
    /// Move every unit, in array order.
    pub(crate) fn movement_step(&mut self) {
        for index in 0..self.world.units.len() {
            self.update_attack_chase(index);
            if self.world.units[index].current_order == OrderType::AttackMove && self.holds_for_hostile(index) {
                continue;
            }
            self.move_unit(index);
        }
    }

    /// Keep an attacking unit within range of its target.
    fn update_attack_chase(&mut self, index: usize) {
        let unit = &self.world.units[index];
        if unit.current_order != OrderType::Attack {
            return;
        }
        let target = unit.order_target.and_then(|t| self.hostile_target_position(unit.faction, t));
        let Some((tx, ty, reach)) = target else {
            let unit = &mut self.world.units[index];
            unit.current_order = OrderType::Idle;
            unit.order_target = None;
            unit.attack_target = None;
            self.halt(index);
            return;
        };

        let range = self
            .unit_types
            .get(unit.type_id)
            .map_or(0, |t| t.attack.range)
            + reach;
        if distance_squared(unit.x, unit.y, tx, ty) <= i64::from(range) * i64::from(range) {
            if unit.has_move_target {
                self.halt(index);
            }
            return;
        }

        let same_tile = unit.has_move_target
            && to_tile(unit.target_x) == to_tile(tx)
            && to_tile(unit.target_y) == to_tile(ty);
        if same_tile {
            let unit = &mut self.world.units[index];
            unit.target_x = tx;
            unit.target_y = ty;
        } else {
            self.plan_move(index, tx, ty);
        }
    }

    fn holds_for_hostile(&self, index: usize) -> bool {
        let unit = &self.world.units[index];
        self.unit_types
            .get(unit.type_id)
            .filter(|t| t.is_combatant())
            .is_some_and(|t| self.nearest_hostile_unit(index, t.attack.range).is_some())
    }

    fn move_unit(&mut self, index: usize) {
        let unit = &self.world.units[index];
        if !unit.has_move_target {
            return;
        }
        let id = unit.id;
        let (ux, uy) = (unit.x, unit.y);
        let (dest_x, dest_y) = (unit.target_x, unit.target_y);
        let speed = self.unit_types.get(unit.type_id).map_or(0, |t| t.speed);
        let move_dist = i64::from(speed) * i64::from(MS_PER_TICK) / 1000;
        if move_dist <= 0 {
            return;
        }

        let mut waypoint = None;
        if let Some(path) = self.world.paths.get_mut(&id) {
            while let Some(&(tx, ty)) = path.front() {
                let (cx, cy) = (tile_center(tx), tile_center(ty));
                if (ux - cx).abs() < WAYPOINT_TOLERANCE && (uy - cy).abs() < WAYPOINT_TOLERANCE {
                    path.pop_front();
                } else {
                    waypoint = Some((cx, cy));
                    break;
                }
            }
            if path.is_empty() {
                self.world.paths.remove(&id);
            }
        }
        let final_leg = waypoint.is_none();
        let (gx, gy) = waypoint.unwrap_or((dest_x, dest_y));

        let dx = i64::from(gx) - i64::from(ux);
        let dy = i64::from(gy) - i64::from(uy);
        let dist2 = dx * dx + dy * dy;
        if dist2 == 0 {
            if final_leg {
                self.arrive(index);
            }
            return;
        }
        let dist = isqrt(dist2);
        if dist <= move_dist {
            let unit = &mut self.world.units[index];
            unit.x = gx;
            unit.y = gy;
            if final_leg {
                self.arrive(index);
            }
            return;
        }

        let (px, py) = (dx * move_dist / dist, dy * move_dist / dist);
        let (mut mx, mut my) = (px, py);

        if self.flow_field.target() == Some((to_tile(dest_x), to_tile(dest_y))) {
            let (fx, fy) = self.flow_field.direction_at((to_tile(ux), to_tile(uy)));
            mx = (mx * 3 + i64::from(fx) * move_dist) / 4;
            my = (my * 3 + i64::from(fy) * move_dist) / 4;
        }

        let (sx, sy) = self.separation_push(index);
        mx += sx;
        my += sy;

        // Steering may only bend the step: a candidate that ends farther
        // from the goal or on a newly blocked tile falls through to the
        // plain path step, then to single-axis slides.
        let candidates = [(mx, my), (px, py), (px, 0), (0, py)];
        let landing = candidates
            .into_iter()
            .map(|(cx, cy)| self.offset_position(ux, uy, cx, cy))
            .find(|&(nx, ny)| {
                distance_squared(nx, ny, gx, gy) <= dist2 && self.may_enter(ux, uy, nx, ny)
            });
        if let Some((nx, ny)) = landing {
            let unit = &mut self.world.units[index];
            unit.x = nx;
            unit.y = ny;
        }
    }

    fn offset_position(&self, x: i32, y: i32, dx: i64, dy: i64) -> (i32, i32) {
        let shift = |v: i32, d: i64| (i64::from(v) + d).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        self.clamp_to_map(shift(x, dx), shift(y, dy))
    }

    /// Blocked tiles can be left or stayed on but never entered.
    fn may_enter(&self, from_x: i32, from_y: i32, to_x: i32, to_y: i32) -> bool {
        let (tx, ty) = (to_tile(to_x), to_tile(to_y));
        (tx, ty) == (to_tile(from_x), to_tile(from_y)) || !self.nav.is_blocked(tx, ty)
    }

    /// Sum of repulsion from neighbors within [`SEPARATION_RADIUS`].
    fn separation_push(&self, index: usize) -> (i64, i64) {
        let units = &self.world.units;
        let unit = &units[index];
        let radius = i64::from(SEPARATION_RADIUS);
        let (mut ax, mut ay) = (0i64, 0i64);
        for other in self.spatial.query(unit.x, unit.y, SEPARATION_RADIUS) {
            if other == index || other >= units.len() {
                continue;
            }
            let o = &units[other];
            let rx = i64::from(unit.x) - i64::from(o.x);
            let ry = i64::from(unit.y) - i64::from(o.y);
            let r2 = rx * rx + ry * ry;
            if r2 == 0 || r2 > radius * radius {
                continue;
            }
            let r = isqrt(r2);
            if r == 0 {
                continue;
            }
            let force = radius - r;
            ax += rx * force / r;
            ay += ry * force / r;
        }
        (ax / SEPARATION_DIVISOR, ay / SEPARATION_DIVISOR)
    }

    fn arrive(&mut self, index: usize) {
        let unit = &mut self.world.units[index];
        unit.x = unit.target_x;
        unit.y = unit.target_y;
        unit.has_move_target = false;
        if matches!(unit.current_order, OrderType::Move | OrderType::AttackMove) {
            unit.current_order = OrderType::Idle;
        }
        let id = unit.id;
        self.world.paths.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use crate::components::{EntityId, OrderType};
    use crate::config::SimConfig;
    use crate::data::UnitData;
    use crate::factions::FactionId;
    use crate::math::{distance_squared, to_tile};
    use crate::simulation::Simulator;

    fn sim_with_walker(speed: i32) -> (Simulator, crate::components::UnitTypeId) {
        let mut sim = Simulator::new(SimConfig {
            map_width: 40,
            map_height: 40,
            ..SimConfig::default()
        });
        let walker = sim
            .register_unit_type(UnitData {
                speed,
                max_hp: 10,
                ..UnitData::default()
            })
            .unwrap();
        (sim, walker)
    }

    fn position(sim: &Simulator, id: EntityId) -> (i32, i32) {
        let u = sim.world().unit(id).unwrap();
        (u.x, u.y)
    }

    #[test]
    fn test_lands_exactly_on_target() {
        let (mut sim, walker) = sim_with_walker(3000);
        let id = sim.spawn_unit(walker, FactionId(0), 1000, 1000, 0).unwrap();
        sim.issue_move(id, 1100, 1050);
        sim.tick();
        assert_eq!(position(&sim, id), (1100, 1050));
        let unit = sim.world().unit(id).unwrap();
        assert!(!unit.has_move_target);
        assert_eq!(unit.current_order, OrderType::Idle);
    }

    #[test]
    fn test_never_moves_away_from_target() {
        let (mut sim, walker) = sim_with_walker(2500);
        let id = sim.spawn_unit(walker, FactionId(0), 500, 700, 0).unwrap();
        sim.issue_move(id, 15_300, 9_100);
        let target = (15_300, 9_100);
        let mut last = distance_squared(500, 700, target.0, target.1);
        for _ in 0..200 {
            sim.tick();
            let (x, y) = position(&sim, id);
            let now = distance_squared(x, y, target.0, target.1);
            assert!(now <= last);
            last = now;
        }
        assert_eq!(position(&sim, id), target);
    }

    #[test]
    fn test_follows_waypoints_around_wall() {
        let (mut sim, walker) = sim_with_walker(4000);
        for y in 0..12 {
            sim.set_terrain_blocked(6, y, true);
        }
        let id = sim.spawn_unit(walker, FactionId(0), 2500, 2500, 0).unwrap();
        sim.issue_move(id, 10_500, 2500);
        let mut deepest = 0;
        for _ in 0..200 {
            sim.tick();
            deepest = deepest.max(position(&sim, id).1);
        }
        assert!(deepest >= 12_000);
        assert_eq!(position(&sim, id), (10_500, 2500));
        assert!(sim.world().paths.get(&id).is_none());
    }

    #[test]
    fn test_separation_pushes_apart() {
        let (mut sim, walker) = sim_with_walker(1000);
        let a = sim.spawn_unit(walker, FactionId(0), 5000, 5000, 0).unwrap();
        let b = sim.spawn_unit(walker, FactionId(0), 5000, 5300, 0).unwrap();
        sim.issue_move(a, 20_000, 5000);
        sim.tick();
        let (ax, ay) = position(&sim, a);
        assert!(ax > 5000);
        assert!(ay < 5000);
        assert_eq!(position(&sim, b), (5000, 5300));
    }

    #[test]
    fn test_flow_field_blend_only_for_matching_destination() {
        let (mut sim, walker) = sim_with_walker(2000);
        let a = sim.spawn_unit(walker, FactionId(0), 1500, 1500, 0).unwrap();
        sim.set_flow_field_target((1, 30));
        sim.issue_move(a, 30_500, 30_500);
        sim.tick();
        assert_eq!(position(&sim, a), (1570, 1570));

        let (mut sim, walker) = sim_with_walker(2000);
        let b = sim.spawn_unit(walker, FactionId(0), 1500, 1500, 0).unwrap();
        sim.set_flow_field_target((30, 30));
        sim.issue_move(b, 30_500, 30_500);
        sim.tick();
        // 75% of the (70, 70) path step plus 25% of the eastward flow step.
        assert_eq!(position(&sim, b), (1577, 1552));
    }

    #[test]
    fn test_crowd_ahead_cannot_push_back() {
        let (mut sim, walker) = sim_with_walker(100);
        let id = sim.spawn_unit(walker, FactionId(0), 5000, 5000, 0).unwrap();
        for (x, y) in [(5050, 4980), (5050, 5020), (5040, 5000), (5060, 5000)] {
            sim.spawn_unit(walker, FactionId(0), x, y, 0).unwrap();
        }
        sim.issue_move(id, 20_000, 5000);
        let mut last = distance_squared(5000, 5000, 20_000, 5000);
        for _ in 0..40 {
            sim.tick();
            let (x, y) = position(&sim, id);
            let now = distance_squared(x, y, 20_000, 5000);
            assert!(now <= last, "pushed back at tick {}: {last} -> {now}", sim.current_tick());
            last = now;
        }
        assert!(last < distance_squared(5000, 5000, 20_000, 5000));
    }

    #[test]
    fn test_push_never_enters_blocked_tile() {
        let (mut sim, walker) = sim_with_walker(100);
        for x in 0..20 {
            sim.set_terrain_blocked(x, 4, true);
        }
        let id = sim.spawn_unit(walker, FactionId(0), 5000, 5000, 0).unwrap();
        sim.spawn_unit(walker, FactionId(0), 5000, 5050, 0).unwrap();
        sim.issue_move(id, 15_000, 5000);
        for _ in 0..20 {
            sim.tick();
            let (x, y) = position(&sim, id);
            assert!(!sim.nav_grid().is_blocked(to_tile(x), to_tile(y)), "entered ({x}, {y})");
        }
        assert!(position(&sim, id).0 > 5000);
    }
}
