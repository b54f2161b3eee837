//! # Grid Storage
//!
//! Spatial index of a map: a `64 × 64` arena of grids, each an `8 × 8` block of
//! cells, each cell holding one container of guids per [`EntityKind`] for the
//! grid-object and world-object sets.
//!
//! ```text
//! Map ── GridTable[64×64] ── Grid ── Cell[8×8] ── { grid objects, world objects } × kind
//! ```
//!
//! Grids only hold guids. Entities themselves are owned by the map's object store,
//! so every structural change goes through the map.
//!
//! [`EntityKind`]: crate::types::EntityKind

mod cell;
mod container;
mod coords;
mod state;
mod table;
mod touched;

pub use cell::{Cell, ContainerType, KindContainers};
pub use container::IndexedVec;
pub use coords::{
    compute_cell_coord, compute_grid_coord, is_valid_map_coord, CellArea, CellCoord, GridCoord,
    CENTER_GRID_CELL_ID, CENTER_GRID_ID, MAP_HALFSIZE, MAP_SIZE, MAX_NUMBER_OF_CELLS,
    MAX_NUMBER_OF_GRIDS, SIZE_OF_GRIDS, SIZE_OF_GRID_CELL, TOTAL_NUMBER_OF_CELLS_PER_MAP,
};
pub use state::{GridInfo, GridState, TimeTracker};
pub use table::{Grid, GridTable};
pub use touched::CellTouchSet;
