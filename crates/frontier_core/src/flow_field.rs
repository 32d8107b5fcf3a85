//! Single-target flow field for mass movement.
//!
//! A BFS from the target tile over the occupancy grid assigns every
//! reachable tile a unit step toward its neighbor closest to the target.
//! The field is rebuilt lazily: occupancy changes only mark it dirty.

use std::collections::VecDeque;

use crate::pathfinding::NavGrid;

const NEIGHBORS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];
const UNREACHED: u32 = u32::MAX;

/// Direction field toward one target tile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowField {
    target: Option<(i32, i32)>,
    dirty: bool,
    width: i32,
    distance: Vec<u32>,
    directions: Vec<(i8, i8)>,
}

impl FlowField {
    /// Inactive field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the field at a tile and schedule a rebuild.
    pub fn set_target(&mut self, tile: (i32, i32)) {
        self.target = Some(tile);
        self.dirty = true;
    }

    /// Deactivate the field.
    pub fn clear(&mut self) {
        self.target = None;
        self.dirty = false;
        self.distance.clear();
        self.directions.clear();
    }

    /// Target tile while active.
    #[must_use]
    pub const fn target(&self) -> Option<(i32, i32)> {
        self.target
    }

    /// Whether a target is set.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.target.is_some()
    }

    /// Schedule a rebuild after an occupancy change.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the next tick has to rebuild the field.
    #[must_use]
    pub const fn needs_rebuild(&self) -> bool {
        self.target.is_some() && self.dirty
    }

    /// Recompute distances and directions from the grid.
    pub fn rebuild(&mut self, grid: &NavGrid) {
        self.dirty = false;
        let Some((tx, ty)) = self.target else {
            return;
        };
        let tiles = grid.tile_count();
        self.width = grid.width();
        self.distance.clear();
        self.distance.resize(tiles, UNREACHED);
        self.directions.clear();
        self.directions.resize(tiles, (0, 0));
        if !grid.in_bounds(tx, ty) {
            return;
        }

        let mut queue = VecDeque::new();
        self.distance[grid.index(tx, ty)] = 0;
        queue.push_back((tx, ty));
        while let Some((x, y)) = queue.pop_front() {
            let next = self.distance[grid.index(x, y)] + 1;
            for (dx, dy) in NEIGHBORS {
                let (nx, ny) = (x + dx, y + dy);
                if grid.is_blocked(nx, ny) {
                    continue;
                }
                let index = grid.index(nx, ny);
                if self.distance[index] == UNREACHED {
                    self.distance[index] = next;
                    queue.push_back((nx, ny));
                }
            }
        }

        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let index = grid.index(x, y);
                let here = self.distance[index];
                if here == UNREACHED || here == 0 {
                    continue;
                }
                let mut best = (here, (0i8, 0i8));
                for (dx, dy) in NEIGHBORS {
                    let (nx, ny) = (x + dx, y + dy);
                    if !grid.in_bounds(nx, ny) {
                        continue;
                    }
                    let d = self.distance[grid.index(nx, ny)];
                    if d < best.0 {
                        best = (d, (dx as i8, dy as i8));
                    }
                }
                self.directions[index] = best.1;
            }
        }
    }

    /// Unit step stored for a tile; `(0, 0)` when unreachable or at the target.
    #[must_use]
    pub fn direction_at(&self, tile: (i32, i32)) -> (i32, i32) {
        if tile.0 < 0 || tile.1 < 0 || tile.0 >= self.width {
            return (0, 0);
        }
        let index = (tile.1 * self.width + tile.0) as usize;
        self.directions
            .get(index)
            .map_or((0, 0), |&(dx, dy)| (i32::from(dx), i32::from(dy)))
    }

    /// BFS steps from a tile to the target, if reachable.
    #[must_use]
    pub fn distance_at(&self, tile: (i32, i32)) -> Option<u32> {
        if tile.0 < 0 || tile.1 < 0 || tile.0 >= self.width {
            return None;
        }
        let index = (tile.1 * self.width + tile.0) as usize;
        self.distance.get(index).copied().filter(|&d| d != UNREACHED)
    }
}
