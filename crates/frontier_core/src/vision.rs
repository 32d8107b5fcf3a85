//! Fog of war for the local vision faction.
//!
//! Visibility is recomputed from scratch every tick as the union of circles
//! around the faction's units and completed buildings. Explored tiles are
//! sticky.

use crate::math::to_tile;
use crate::simulation::Simulator;
use crate::world::FogGrid;

impl Simulator {
    pub(crate) fn vision_step(&mut self) {
        self.visibility_changes.clear();
        let faction = self.config.local_vision_faction;
        let width = self.world.visibility.width();
        let height = self.world.visibility.height();
        let radius = self.config.vision_radius_tiles.max(0);
        let mut next = FogGrid::new(width, height);

        let sources = self
            .world
            .units
            .iter()
            .filter(|u| u.faction == faction)
            .map(|u| (to_tile(u.x), to_tile(u.y)))
            .chain(
                self.world
                    .buildings
                    .iter()
                    .filter(|b| b.faction == faction && !b.under_construction)
                    .map(|b| {
                        let (cx, cy) = b.center();
                        (to_tile(cx), to_tile(cy))
                    }),
            );
        for (cx, cy) in sources {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx * dx + dy * dy <= radius * radius {
                        next.set(cx + dx, cy + dy, 1);
                    }
                }
            }
        }

        for y in 0..height {
            for x in 0..width {
                let seen = next.get(x, y);
                if seen != self.world.visibility.get(x, y) {
                    self.visibility_changes.push((x, y));
                }
                if seen != 0 {
                    self.world.explored.set(x, y, 1);
                }
            }
        }
        self.world.visibility = next;
    }

    /// Whether the local faction sees a tile this tick.
    #[must_use]
    pub fn is_tile_visible(&self, tile_x: i32, tile_y: i32) -> bool {
        self.world.visibility.get(tile_x, tile_y) != 0
    }

    /// Whether the local faction sees a milli-unit position this tick.
    #[must_use]
    pub fn is_world_pos_visible(&self, x: i32, y: i32) -> bool {
        self.is_tile_visible(to_tile(x), to_tile(y))
    }

    /// Whether the local faction has ever seen a tile.
    #[must_use]
    pub fn is_tile_explored(&self, tile_x: i32, tile_y: i32) -> bool {
        self.world.explored.get(tile_x, tile_y) != 0
    }

    /// Tiles whose visibility flipped during the last tick, row-major.
    #[must_use]
    pub fn visibility_changes(&self) -> &[(i32, i32)] {
        &self.visibility_changes
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SimConfig;
    use crate::data::UnitData;
    use crate::factions::FactionId;
    use crate::simulation::Simulator;

    #[test]
    fn test_visibility_follows_units_and_explored_sticks() {
        let mut sim = Simulator::new(SimConfig {
            map_width: 32,
            map_height: 32,
            vision_radius_tiles: 2,
            ..SimConfig::default()
        });
        let scout = sim
            .register_unit_type(UnitData {
                speed: 20_000,
                max_hp: 5,
                ..UnitData::default()
            })
            .unwrap();
        let id = sim.spawn_unit(scout, FactionId(0), 2500, 2500, 0).unwrap();
        sim.spawn_unit(scout, FactionId(1), 20_500, 20_500, 0).unwrap();
        sim.tick();
        assert!(sim.is_tile_visible(2, 2));
        assert!(sim.is_tile_visible(4, 2));
        assert!(!sim.is_tile_visible(4, 4));
        assert!(!sim.is_world_pos_visible(20_500, 20_500));
        assert_eq!(sim.visibility_changes().len(), 13);

        sim.issue_move(id, 25_500, 2500);
        for _ in 0..40 {
            sim.tick();
        }
        assert!(!sim.is_tile_visible(2, 2));
        assert!(sim.is_tile_explored(2, 2));
        assert!(sim.is_tile_visible(25, 2));
    }
}
