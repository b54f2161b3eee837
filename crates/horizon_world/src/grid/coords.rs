//! Coordinate math: continuous world positions to grid and cell indices.
//!
//! A map is a square lattice of [`MAX_NUMBER_OF_GRIDS`]² grids, each split into
//! [`MAX_NUMBER_OF_CELLS`]² cells. World coordinate `0.0` sits on the lower edge of
//! the centre grid, so the playable square is `[-MAP_HALFSIZE, MAP_HALFSIZE)`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grids per map side.
pub const MAX_NUMBER_OF_GRIDS: u32 = 64;
/// Side length of one grid, in yards.
pub const SIZE_OF_GRIDS: f32 = 533.333_3;
/// Index of the grid whose lower edge is world coordinate zero.
pub const CENTER_GRID_ID: u32 = MAX_NUMBER_OF_GRIDS / 2;

/// Cells per grid side.
pub const MAX_NUMBER_OF_CELLS: u32 = 8;
/// Side length of one cell, in yards.
pub const SIZE_OF_GRID_CELL: f32 = SIZE_OF_GRIDS / MAX_NUMBER_OF_CELLS as f32;
/// Cells per map side.
pub const TOTAL_NUMBER_OF_CELLS_PER_MAP: u32 = MAX_NUMBER_OF_GRIDS * MAX_NUMBER_OF_CELLS;
/// Index of the cell whose lower edge is world coordinate zero.
pub const CENTER_GRID_CELL_ID: u32 = TOTAL_NUMBER_OF_CELLS_PER_MAP / 2;

pub const MAP_SIZE: f32 = SIZE_OF_GRIDS * MAX_NUMBER_OF_GRIDS as f32;
pub const MAP_HALFSIZE: f32 = MAP_SIZE / 2.0;

/// Index of a grid inside a map: `x`, `y` in `[0, MAX_NUMBER_OF_GRIDS)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: u32,
    pub y: u32,
}

impl GridCoord {
    pub fn new(x: u32, y: u32) -> Self {
        debug_assert!(x < MAX_NUMBER_OF_GRIDS && y < MAX_NUMBER_OF_GRIDS);
        Self { x, y }
    }

    /// Slot index of this grid in a row-major `64 × 64` table.
    pub fn index(self) -> usize {
        (self.y * MAX_NUMBER_OF_GRIDS + self.x) as usize
    }

    /// Iterates the global cell coordinates covered by this grid.
    pub fn cells(self) -> impl Iterator<Item = CellCoord> {
        let base_x = self.x * MAX_NUMBER_OF_CELLS;
        let base_y = self.y * MAX_NUMBER_OF_CELLS;
        (0..MAX_NUMBER_OF_CELLS).flat_map(move |cy| {
            (0..MAX_NUMBER_OF_CELLS).map(move |cx| CellCoord::new(base_x + cx, base_y + cy))
        })
    }

    /// World-space lower/upper corners of this grid on the x/y plane.
    pub fn bounds(self) -> (f32, f32, f32, f32) {
        let min_x = (self.x as f32 - CENTER_GRID_ID as f32) * SIZE_OF_GRIDS;
        let min_y = (self.y as f32 - CENTER_GRID_ID as f32) * SIZE_OF_GRIDS;
        (min_x, min_y, min_x + SIZE_OF_GRIDS, min_y + SIZE_OF_GRIDS)
    }

    /// Planar distance from a point to the nearest edge of this grid (zero inside).
    pub fn distance_to(self, x: f32, y: f32) -> f32 {
        let (min_x, min_y, max_x, max_y) = self.bounds();
        let dx = (min_x - x).max(0.0).max(x - max_x);
        let dy = (min_y - y).max(0.0).max(y - max_y);
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// Map-wide cell coordinate: `x`, `y` in `[0, TOTAL_NUMBER_OF_CELLS_PER_MAP)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: u32,
    pub y: u32,
}

impl CellCoord {
    pub fn new(x: u32, y: u32) -> Self {
        debug_assert!(x < TOTAL_NUMBER_OF_CELLS_PER_MAP && y < TOTAL_NUMBER_OF_CELLS_PER_MAP);
        Self { x, y }
    }

    /// Stable map-wide cell id, also the key spawn data is stored under.
    pub fn id(self) -> u32 {
        self.y * TOTAL_NUMBER_OF_CELLS_PER_MAP + self.x
    }

    pub fn from_id(id: u32) -> Self {
        Self::new(id % TOTAL_NUMBER_OF_CELLS_PER_MAP, id / TOTAL_NUMBER_OF_CELLS_PER_MAP)
    }

    pub fn grid(self) -> GridCoord {
        GridCoord::new(self.x / MAX_NUMBER_OF_CELLS, self.y / MAX_NUMBER_OF_CELLS)
    }

    /// Position of this cell inside its grid.
    pub fn local(self) -> (u32, u32) {
        (self.x % MAX_NUMBER_OF_CELLS, self.y % MAX_NUMBER_OF_CELLS)
    }

    pub fn local_index(self) -> usize {
        let (lx, ly) = self.local();
        (ly * MAX_NUMBER_OF_CELLS + lx) as usize
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

fn compute(value: f32, center: u32, size: f32, max: u32) -> u32 {
    let index = (value as f64 / size as f64 + center as f64).floor();
    index.clamp(0.0, (max - 1) as f64) as u32
}

/// Grid containing a world coordinate. Out-of-range coordinates clamp to the edge grid.
pub fn compute_grid_coord(x: f32, y: f32) -> GridCoord {
    GridCoord::new(
        compute(x, CENTER_GRID_ID, SIZE_OF_GRIDS, MAX_NUMBER_OF_GRIDS),
        compute(y, CENTER_GRID_ID, SIZE_OF_GRIDS, MAX_NUMBER_OF_GRIDS),
    )
}

/// Map-wide cell containing a world coordinate. Out-of-range coordinates clamp.
pub fn compute_cell_coord(x: f32, y: f32) -> CellCoord {
    CellCoord::new(
        compute(x, CENTER_GRID_CELL_ID, SIZE_OF_GRID_CELL, TOTAL_NUMBER_OF_CELLS_PER_MAP),
        compute(y, CENTER_GRID_CELL_ID, SIZE_OF_GRID_CELL, TOTAL_NUMBER_OF_CELLS_PER_MAP),
    )
}

/// Whether a coordinate lies strictly inside the map square.
pub fn is_valid_map_coord(x: f32, y: f32) -> bool {
    x.is_finite() && y.is_finite() && x.abs() < MAP_HALFSIZE - 0.5 && y.abs() < MAP_HALFSIZE - 0.5
}

/// Rectangle of cells covering a circle, inclusive on both corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellArea {
    pub low: CellCoord,
    pub high: CellCoord,
}

impl CellArea {
    pub fn around(x: f32, y: f32, radius: f32) -> Self {
        if radius <= 0.0 {
            let center = compute_cell_coord(x, y);
            return Self { low: center, high: center };
        }
        Self {
            low: compute_cell_coord(x - radius, y - radius),
            high: compute_cell_coord(x + radius, y + radius),
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (self.low.y..=self.high.y)
            .flat_map(move |y| (self.low.x..=self.high.x).map(move |x| CellCoord::new(x, y)))
    }

    /// Distinct grids the area touches.
    pub fn grids(&self) -> impl Iterator<Item = GridCoord> {
        let low = self.low.grid();
        let high = self.high.grid();
        (low.y..=high.y).flat_map(move |y| (low.x..=high.x).map(move |x| GridCoord::new(x, y)))
    }

    pub fn cell_count(&self) -> usize {
        ((self.high.x - self.low.x + 1) * (self.high.y - self.low.y + 1)) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_maps_to_center() {
        assert_eq!(compute_grid_coord(0.0, 0.0), GridCoord::new(32, 32));
        assert_eq!(compute_cell_coord(0.0, 0.0), CellCoord::new(256, 256));
        assert_eq!(compute_grid_coord(-0.1, -0.1), GridCoord::new(31, 31));
    }

    #[test]
    fn cell_belongs_to_containing_grid() {
        for &(x, y) in &[(0.0, 0.0), (1234.5, -987.0), (-15990.0, 16010.0), (533.3, 66.7)] {
            let cell = compute_cell_coord(x, y);
            assert_eq!(cell.grid(), compute_grid_coord(x, y), "at ({x}, {y})");
        }
    }

    #[test]
    fn coordinates_clamp_at_map_edge() {
        assert_eq!(compute_grid_coord(1.0e9, -1.0e9), GridCoord::new(63, 0));
        assert!(!is_valid_map_coord(MAP_HALFSIZE, 0.0));
        assert!(!is_valid_map_coord(f32::NAN, 0.0));
        assert!(is_valid_map_coord(100.0, -100.0));
    }

    #[test]
    fn cell_id_round_trips() {
        let cell = CellCoord::new(300, 17);
        assert_eq!(CellCoord::from_id(cell.id()), cell);
        assert_eq!(cell.grid(), GridCoord::new(37, 2));
        assert_eq!(cell.local(), (4, 1));
    }

    #[test]
    fn area_covers_radius() {
        let area = CellArea::around(0.0, 0.0, SIZE_OF_GRID_CELL * 1.5);
        assert_eq!(area.low, CellCoord::new(254, 254));
        assert_eq!(area.high, CellCoord::new(257, 257));
        assert_eq!(area.cell_count(), 16);
        assert_eq!(area.grids().count(), 4);
    }

    #[test]
    fn grid_distance_is_zero_inside() {
        let grid = GridCoord::new(32, 32);
        assert_eq!(grid.distance_to(10.0, 10.0), 0.0);
        assert!((grid.distance_to(-10.0, 10.0) - 10.0).abs() < 1e-3);
    }
}
