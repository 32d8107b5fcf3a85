//! Building placement and construction.
//!
//! Placement snaps the origin to its tile and reserves every footprint tile
//! in the navigation grid, which also dirties the flow field. A building
//! under construction starts at a tenth of its max HP and gains HP linearly
//! with elapsed build time. Population capacity is granted only once the
//! building completes.

use tracing::debug;

use crate::components::{Building, BuildingTypeId, EntityId};
use crate::error::{GameError, Result};
use crate::events::SimEventKind;
use crate::factions::FactionId;
use crate::math::{to_tile, TILE_SIZE};
use crate::simulation::{Simulator, MS_PER_TICK};

/// HP of a freshly placed construction site.
#[must_use]
pub const fn construction_start_hp(max_hp: i32) -> i32 {
    let hp = max_hp / 10;
    if hp < 1 {
        1
    } else {
        hp
    }
}

/// HP a site should have gained after `elapsed` of `total` build time.
const fn construction_hp_at(max_hp: i32, elapsed: i32, total: i32) -> i32 {
    let start = construction_start_hp(max_hp);
    if total <= 0 {
        return max_hp;
    }
    start + ((max_hp - start) as i64 * elapsed as i64 / total as i64) as i32
}

impl Simulator {
    /// Whether a building type fits with its origin on `(tile_x, tile_y)`.
    ///
    /// The whole footprint must be on the map and free of terrain and
    /// other buildings. Unknown types never fit.
    #[must_use]
    pub fn can_place_building(&self, building_type: BuildingTypeId, tile_x: i32, tile_y: i32) -> bool {
        self.content.building(building_type).is_some_and(|data| {
            let (w, h) = data.footprint();
            self.nav.is_rect_free(tile_x, tile_y, w, h)
        })
    }

    /// Start constructing a building with its origin at `(x, y)` milli-units.
    ///
    /// Checks, in order: faction, building type, faction age, placement and
    /// cost. On any failure nothing changes. On success the cost is
    /// deducted and the site is placed at 10% HP.
    pub fn try_start_construction(
        &mut self,
        faction: FactionId,
        x: i32,
        y: i32,
        building_type: BuildingTypeId,
    ) -> Result<EntityId> {
        let stockpile = self.faction_mut(faction)?.resources;
        let age = self.world.factions[faction.index()].age;
        let data = self
            .content
            .building(building_type)
            .ok_or(GameError::UnknownBuildingType(building_type))?;
        if data.age > age {
            return Err(GameError::TechRequirementNotMet(format!(
                "{} requires age {} (faction is at age {age})",
                data.id, data.age
            )));
        }
        let cost = data.cost;
        let (tile_x, tile_y) = (to_tile(x), to_tile(y));
        if !self.can_place_building(building_type, tile_x, tile_y) {
            return Err(GameError::PlacementBlocked { x: tile_x, y: tile_y });
        }
        stockpile.check_afford(&cost)?;

        let id = self.place_building(building_type, faction, x, y, true)?;
        self.world.factions[faction.index()].resources.deduct(&cost);
        debug!(%id, %building_type, %faction, tile_x, tile_y, "construction started");
        Ok(id)
    }

    /// Validate placement and insert a building.
    pub(crate) fn place_building(
        &mut self,
        building_type: BuildingTypeId,
        faction: FactionId,
        x: i32,
        y: i32,
        under_construction: bool,
    ) -> Result<EntityId> {
        self.faction_mut(faction)?;
        let data = self
            .content
            .building(building_type)
            .ok_or(GameError::UnknownBuildingType(building_type))?;
        let (tile_x, tile_y) = (to_tile(x), to_tile(y));
        let (w, h) = data.footprint();
        if !self.nav.is_rect_free(tile_x, tile_y, w, h) {
            return Err(GameError::PlacementBlocked { x: tile_x, y: tile_y });
        }
        let max_hp = data.effective_max_hp();
        let build_ms = data.effective_build_time_ms();
        let provides = data.provides_population;

        let id = self.world.alloc_id();
        self.world.push_building(Building {
            id,
            type_id: building_type,
            faction,
            x: tile_x * TILE_SIZE,
            y: tile_y * TILE_SIZE,
            hp: if under_construction {
                construction_start_hp(max_hp)
            } else {
                max_hp
            },
            max_hp,
            footprint_w: w,
            footprint_h: h,
            under_construction,
            build_total_ms: build_ms,
            build_remaining_ms: if under_construction { build_ms } else { 0 },
            training: None,
            pending: Vec::new(),
            rally_point: None,
        });
        self.nav.set_rect(tile_x, tile_y, w, h, true);
        self.flow_field.mark_dirty();

        let entry = &mut self.world.factions[faction.index()];
        entry.active = true;
        if !under_construction {
            entry.pop_cap += provides;
        }
        Ok(id)
    }

    /// Advance every construction site by one tick.
    pub(crate) fn construction_step(&mut self) {
        let tick = self.world.tick;
        for index in 0..self.world.buildings.len() {
            let building = &mut self.world.buildings[index];
            if !building.under_construction || building.hp <= 0 {
                continue;
            }
            let total = building.build_total_ms.max(1);
            let before = construction_hp_at(building.max_hp, total - building.build_remaining_ms, total);
            building.build_remaining_ms = (building.build_remaining_ms - MS_PER_TICK).max(0);
            let after = construction_hp_at(building.max_hp, total - building.build_remaining_ms, total);
            building.hp = (building.hp + after - before).min(building.max_hp);
            if building.build_remaining_ms > 0 {
                continue;
            }

            building.under_construction = false;
            building.hp = building.max_hp;
            let (id, faction, type_id) = (building.id, building.faction, building.type_id);
            let provides = self
                .content
                .building(type_id)
                .map_or(0, |data| data.provides_population);
            self.world.factions[faction.index()].pop_cap += provides;
            self.events.push(
                tick,
                SimEventKind::ConstructionComplete {
                    building: id,
                    faction,
                },
            );
            debug!(%id, %faction, tick, "construction complete");
        }
    }
}
