//! Tile-grid A* over the building occupancy grid.
//!
//! Integer costs (10 orthogonal, 14 diagonal) and an octile heuristic keep
//! every result identical across platforms. Ties in the open set break on
//! tile coordinates so expansion order never depends on heap internals.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

/// Largest supported grid side, in tiles.
pub const MAX_GRID_SIZE: i32 = 128;

const ORTHOGONAL_COST: i32 = 10;
const DIAGONAL_COST: i32 = 14;

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Occupancy grid: a tile is blocked while a building footprint covers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavGrid {
    width: i32,
    height: i32,
    blocked: Vec<bool>,
}

impl Default for NavGrid {
    fn default() -> Self {
        Self::new(MAX_GRID_SIZE, MAX_GRID_SIZE)
    }
}

impl NavGrid {
    /// Create an open grid. Dimensions clamp to `1..=MAX_GRID_SIZE`.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.clamp(1, MAX_GRID_SIZE);
        let height = height.clamp(1, MAX_GRID_SIZE);
        Self {
            width,
            height,
            blocked: vec![false; (width * height) as usize],
        }
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Check if tile coordinates are within grid bounds.
    #[must_use]
    pub const fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// Row-major index of an in-bounds tile.
    #[inline]
    #[must_use]
    pub const fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    /// Whether a tile is occupied. Out-of-bounds tiles count as blocked.
    #[must_use]
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        !self.in_bounds(x, y) || self.blocked[self.index(x, y)]
    }

    /// Check if a tile is walkable.
    #[must_use]
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        !self.is_blocked(x, y)
    }

    /// Mark or clear one tile. Returns `false` if out of bounds.
    pub fn set_blocked(&mut self, x: i32, y: i32, blocked: bool) -> bool {
        if self.in_bounds(x, y) {
            let index = self.index(x, y);
            self.blocked[index] = blocked;
            true
        } else {
            false
        }
    }

    /// Mark or clear a rectangle, ignoring the parts out of bounds.
    pub fn set_rect(&mut self, x: i32, y: i32, w: i32, h: i32, blocked: bool) {
        for ty in y..y + h {
            for tx in x..x + w {
                self.set_blocked(tx, ty, blocked);
            }
        }
    }

    /// Whether a rectangle lies inside the grid and is entirely free.
    #[must_use]
    pub fn is_rect_free(&self, x: i32, y: i32, w: i32, h: i32) -> bool {
        if w <= 0 || h <= 0 || !self.in_bounds(x, y) || !self.in_bounds(x + w - 1, y + h - 1) {
            return false;
        }
        (y..y + h).all(|ty| (x..x + w).all(|tx| !self.blocked[self.index(tx, ty)]))
    }

    /// Clear every tile.
    pub fn clear(&mut self) {
        self.blocked.fill(false);
    }

    /// Number of tiles.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.blocked.len()
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    index: u32,
    g_score: i32,
    f_score: i32,
    /// Tie-breaker for determinism: lower coordinates first.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for min-heap behavior.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Octile distance: `10*(dx+dy) - 6*min(dx,dy)`.
#[inline]
#[must_use]
pub fn octile_heuristic(x1: i32, y1: i32, x2: i32, y2: i32) -> i32 {
    let dx = (x1 - x2).abs();
    let dy = (y1 - y2).abs();
    ORTHOGONAL_COST * (dx + dy) - 6 * dx.min(dy)
}

#[inline]
fn coords_to_tie_breaker(x: i32, y: i32) -> u64 {
    ((y as u64) << 32) | (x as u32 as u64)
}

/// A* search with scratch buffers reused across calls.
///
/// Buffer reuse is purely an allocation saving; each search resets its
/// view of the buffers through a generation stamp.
#[derive(Debug, Clone, Default)]
pub struct Pathfinder {
    open: BinaryHeap<AStarNode>,
    g_score: Vec<i32>,
    parent: Vec<u32>,
    stamp: Vec<u32>,
    generation: u32,
}

impl Pathfinder {
    /// Empty pathfinder; buffers grow on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn prepare(&mut self, tiles: usize) {
        if self.stamp.len() != tiles {
            self.g_score = vec![0; tiles];
            self.parent = vec![0; tiles];
            self.stamp = vec![0; tiles];
            self.generation = 0;
        }
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.stamp.fill(0);
            self.generation = 1;
        }
        self.open.clear();
    }

    fn g(&self, index: usize) -> i32 {
        if self.stamp[index] == self.generation {
            self.g_score[index]
        } else {
            i32::MAX
        }
    }

    /// Find a tile path from `start` to `goal`, both inclusive.
    ///
    /// The start and goal tiles are always enterable, so units standing in
    /// or heading into a footprint still get a route. Diagonal steps may
    /// not cut blocked corners. Returns `None` when the goal is unreachable
    /// or either end is out of bounds.
    pub fn find_path(
        &mut self,
        grid: &NavGrid,
        start: (i32, i32),
        goal: (i32, i32),
    ) -> Option<Vec<(i32, i32)>> {
        if !grid.in_bounds(start.0, start.1) || !grid.in_bounds(goal.0, goal.1) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        self.prepare(grid.tile_count());
        let start_index = grid.index(start.0, start.1);
        let goal_index = grid.index(goal.0, goal.1);
        self.stamp[start_index] = self.generation;
        self.g_score[start_index] = 0;
        self.parent[start_index] = start_index as u32;
        self.open.push(AStarNode {
            index: start_index as u32,
            g_score: 0,
            f_score: octile_heuristic(start.0, start.1, goal.0, goal.1),
            tie_breaker: coords_to_tie_breaker(start.0, start.1),
        });

        let passable = |x: i32, y: i32| (x, y) == goal || grid.is_walkable(x, y);

        while let Some(current) = self.open.pop() {
            let current_index = current.index as usize;
            if current_index == goal_index {
                return Some(self.reconstruct(grid, start_index, goal_index));
            }
            if current.g_score > self.g(current_index) {
                continue;
            }
            let cx = current_index as i32 % grid.width();
            let cy = current_index as i32 / grid.width();

            for &(dx, dy) in &DIRECTIONS {
                let nx = cx + dx;
                let ny = cy + dy;
                if !grid.in_bounds(nx, ny) || !passable(nx, ny) {
                    continue;
                }
                let diagonal = dx != 0 && dy != 0;
                if diagonal && (!passable(nx, cy) || !passable(cx, ny)) {
                    continue;
                }
                let step = if diagonal { DIAGONAL_COST } else { ORTHOGONAL_COST };
                let tentative_g = current.g_score + step;
                let neighbor_index = grid.index(nx, ny);
                if tentative_g < self.g(neighbor_index) {
                    self.stamp[neighbor_index] = self.generation;
                    self.g_score[neighbor_index] = tentative_g;
                    self.parent[neighbor_index] = current.index;
                    self.open.push(AStarNode {
                        index: neighbor_index as u32,
                        g_score: tentative_g,
                        f_score: tentative_g + octile_heuristic(nx, ny, goal.0, goal.1),
                        tie_breaker: coords_to_tie_breaker(nx, ny),
                    });
                }
            }
        }
        None
    }

    fn reconstruct(&self, grid: &NavGrid, start_index: usize, goal_index: usize) -> Vec<(i32, i32)> {
        let mut path = Vec::new();
        let mut current = goal_index;
        loop {
            path.push((current as i32 % grid.width(), current as i32 / grid.width()));
            if current == start_index {
                break;
            }
            current = self.parent[current] as usize;
        }
        path.reverse();
        path
    }
}

/// Smooth a tile path by removing waypoints that have line of sight past them.
///
/// The first and last tiles are kept.
#[must_use]
pub fn smooth_path(grid: &NavGrid, path: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
    if path.len() <= 2 {
        return path;
    }

    let mut smoothed = Vec::with_capacity(path.len());
    smoothed.push(path[0]);

    let mut current_idx = 0;
    while current_idx < path.len() - 1 {
        let mut furthest_visible = current_idx + 1;
        for check_idx in (current_idx + 2)..path.len() {
            if has_line_of_sight(grid, path[current_idx], path[check_idx]) {
                furthest_visible = check_idx;
            }
        }
        smoothed.push(path[furthest_visible]);
        current_idx = furthest_visible;
    }

    smoothed
}

/// Bresenham walk between two tiles; endpoints may be blocked.
fn has_line_of_sight(grid: &NavGrid, start: (i32, i32), end: (i32, i32)) -> bool {
    let (x0, y0) = start;
    let (x1, y1) = end;
    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;
    let mut x = x0;
    let mut y = y0;

    loop {
        let endpoint = (x, y) == start || (x, y) == end;
        if !endpoint && grid.is_blocked(x, y) {
            return false;
        }
        if (x, y) == end {
            return true;
        }

        let e2 = 2 * err;
        if e2 > -dy && e2 < dx {
            // Diagonal step: both adjacent cells must be open.
            let side_a = (x + sx, y);
            let side_b = (x, y + sy);
            if (side_a != end && grid.is_blocked(side_a.0, side_a.1))
                || (side_b != end && grid.is_blocked(side_b.0, side_b.1))
            {
                return false;
            }
        }
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_cost(path: &[(i32, i32)]) -> i32 {
        path.windows(2)
            .map(|w| {
                let diagonal = w[0].0 != w[1].0 && w[0].1 != w[1].1;
                if diagonal {
                    DIAGONAL_COST
                } else {
                    ORTHOGONAL_COST
                }
            })
            .sum()
    }

    #[test]
    fn test_grid_dimensions_clamp() {
        let grid = NavGrid::new(0, 500);
        assert_eq!(grid.width(), 1);
        assert_eq!(grid.height(), MAX_GRID_SIZE);
    }

    #[test]
    fn test_set_and_query_rect() {
        let mut grid = NavGrid::new(10, 10);
        assert!(grid.is_rect_free(2, 2, 3, 3));
        grid.set_rect(2, 2, 3, 3, true);
        assert!(grid.is_blocked(4, 4));
        assert!(!grid.is_rect_free(0, 0, 3, 3));
        assert!(!grid.is_rect_free(9, 9, 2, 2));
        grid.set_rect(2, 2, 3, 3, false);
        assert!(grid.is_rect_free(2, 2, 3, 3));
    }

    #[test]
    fn test_octile_heuristic() {
        assert_eq!(octile_heuristic(0, 0, 3, 0), 30);
        assert_eq!(octile_heuristic(0, 0, 3, 3), 42);
        assert_eq!(octile_heuristic(0, 0, 4, 2), 52);
    }

    #[test]
    fn test_simple_path() {
        let grid = NavGrid::new(10, 10);
        let mut finder = Pathfinder::new();
        let path = finder.find_path(&grid, (0, 0), (5, 0)).unwrap();
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(5, 0)));
        assert_eq!(path.len(), 6);
    }

    #[test]
    fn test_diagonal_path_is_optimal() {
        let grid = NavGrid::new(10, 10);
        let mut finder = Pathfinder::new();
        let path = finder.find_path(&grid, (0, 0), (4, 2)).unwrap();
        assert_eq!(path_cost(&path), 52);
    }

    #[test]
    fn test_path_around_obstacle() {
        let mut grid = NavGrid::new(10, 10);
        grid.set_rect(5, 0, 1, 8, true);
        let mut finder = Pathfinder::new();
        let path = finder.find_path(&grid, (2, 2), (8, 2)).unwrap();
        assert!(path.iter().all(|&(x, y)| grid.is_walkable(x, y)));
        assert!(path.iter().any(|&(_, y)| y >= 8));
    }

    #[test]
    fn test_no_corner_cutting() {
        let mut grid = NavGrid::new(3, 3);
        grid.set_blocked(1, 0, true);
        let mut finder = Pathfinder::new();
        let path = finder.find_path(&grid, (0, 0), (2, 0)).unwrap();
        for w in path.windows(2) {
            let (a, b) = (w[0], w[1]);
            if a.0 != b.0 && a.1 != b.1 {
                assert!(grid.is_walkable(b.0, a.1) && grid.is_walkable(a.0, b.1));
            }
        }
    }

    #[test]
    fn test_no_path_exists() {
        let mut grid = NavGrid::new(10, 10);
        grid.set_rect(5, 0, 1, 10, true);
        let mut finder = Pathfinder::new();
        assert!(finder.find_path(&grid, (2, 2), (8, 2)).is_none());
    }

    #[test]
    fn test_blocked_goal_is_enterable() {
        let mut grid = NavGrid::new(10, 10);
        grid.set_rect(6, 6, 2, 2, true);
        let mut finder = Pathfinder::new();
        let path = finder.find_path(&grid, (0, 0), (6, 6)).unwrap();
        assert_eq!(path.last(), Some(&(6, 6)));
    }

    #[test]
    fn test_path_to_same_cell() {
        let grid = NavGrid::new(4, 4);
        let mut finder = Pathfinder::new();
        assert_eq!(finder.find_path(&grid, (1, 1), (1, 1)), Some(vec![(1, 1)]));
    }

    #[test]
    fn test_out_of_bounds_is_none() {
        let grid = NavGrid::new(4, 4);
        let mut finder = Pathfinder::new();
        assert!(finder.find_path(&grid, (0, 0), (4, 0)).is_none());
    }

    #[test]
    fn test_path_smoothing() {
        let grid = NavGrid::new(10, 10);
        let mut finder = Pathfinder::new();
        let path = finder.find_path(&grid, (0, 0), (9, 3)).unwrap();
        let smoothed = smooth_path(&grid, path.clone());
        assert!(smoothed.len() <= path.len());
        assert_eq!(smoothed.first(), path.first());
        assert_eq!(smoothed.last(), path.last());
        assert_eq!(smoothed.len(), 2);
    }

    #[test]
    fn test_determinism_and_buffer_reuse() {
        let mut grid = NavGrid::new(32, 32);
        grid.set_rect(10, 5, 2, 20, true);
        grid.set_rect(20, 0, 2, 25, true);
        let mut reused = Pathfinder::new();
        let first = reused.find_path(&grid, (1, 1), (30, 30));
        for _ in 0..5 {
            assert_eq!(reused.find_path(&grid, (1, 1), (30, 30)), first);
            assert_eq!(Pathfinder::new().find_path(&grid, (1, 1), (30, 30)), first);
        }
    }
}
