//! Uniform bucket grid over unit positions.
//!
//! Rebuilt from scratch at the start of every tick. Buckets hold dense
//! unit indices in ascending order, so queries visit neighbors in a fixed
//! order.

use crate::components::Unit;

/// Bucket side length in milli-units.
pub const SPATIAL_CELL_SIZE: i32 = 2000;

/// Bucket grid covering the map.
#[derive(Debug, Clone, Default)]
pub struct SpatialGrid {
    cols: i32,
    rows: i32,
    buckets: Vec<Vec<usize>>,
}

impl SpatialGrid {
    /// Grid covering a map of `width_milli` x `height_milli`.
    #[must_use]
    pub fn new(width_milli: i32, height_milli: i32) -> Self {
        let cols = (width_milli.max(1) + SPATIAL_CELL_SIZE - 1) / SPATIAL_CELL_SIZE;
        let rows = (height_milli.max(1) + SPATIAL_CELL_SIZE - 1) / SPATIAL_CELL_SIZE;
        Self {
            cols,
            rows,
            buckets: vec![Vec::new(); (cols * rows) as usize],
        }
    }

    fn cell_of(&self, x: i32, y: i32) -> (i32, i32) {
        (
            (x.div_euclid(SPATIAL_CELL_SIZE)).clamp(0, self.cols - 1),
            (y.div_euclid(SPATIAL_CELL_SIZE)).clamp(0, self.rows - 1),
        )
    }

    /// Re-bucket every unit. Units off the map land in the nearest edge bucket.
    pub fn rebuild(&mut self, units: &[Unit]) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        for (index, unit) in units.iter().enumerate() {
            let (cx, cy) = self.cell_of(unit.x, unit.y);
            self.buckets[(cy * self.cols + cx) as usize].push(index);
        }
    }

    /// Unit indices in buckets overlapping the square of `radius` around a point.
    ///
    /// Callers filter by exact distance.
    pub fn query(&self, x: i32, y: i32, radius: i32) -> impl Iterator<Item = usize> + '_ {
        let (min_x, min_y) = self.cell_of(x - radius, y - radius);
        let (max_x, max_y) = self.cell_of(x + radius, y + radius);
        (min_y..=max_y).flat_map(move |cy| {
            (min_x..=max_x).flat_map(move |cx| self.buckets[(cy * self.cols + cx) as usize].iter().copied())
        })
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
