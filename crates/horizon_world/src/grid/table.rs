//! Grids and the per-map arena of grid slots.

use super::cell::{Cell, ContainerType};
use super::coords::{CellCoord, GridCoord, MAX_NUMBER_OF_CELLS, MAX_NUMBER_OF_GRIDS};
use super::state::{GridInfo, GridState};
use crate::types::{EntityKind, Guid};

/// A fixed `8 × 8` block of cells with its lifecycle state.
#[derive(Debug)]
pub struct Grid {
    coord: GridCoord,
    state: GridState,
    info: GridInfo,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(coord: GridCoord, expiry_ms: u64, unload_lock: bool) -> Self {
        let cell_count = (MAX_NUMBER_OF_CELLS * MAX_NUMBER_OF_CELLS) as usize;
        Self {
            coord,
            state: GridState::Invalid,
            info: GridInfo::new(expiry_ms, unload_lock),
            cells: vec![Cell::default(); cell_count],
        }
    }

    pub fn coord(&self) -> GridCoord {
        self.coord
    }

    pub fn state(&self) -> GridState {
        self.state
    }

    pub fn set_state(&mut self, state: GridState) {
        self.state = state;
    }

    pub fn info(&self) -> &GridInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut GridInfo {
        &mut self.info
    }

    /// # Panics
    ///
    /// Panics if `cell` lies outside this grid.
    pub fn cell(&self, cell: CellCoord) -> &Cell {
        assert_eq!(cell.grid(), self.coord, "cell {cell} is not part of grid {}", self.coord);
        &self.cells[cell.local_index()]
    }

    /// # Panics
    ///
    /// Panics if `cell` lies outside this grid.
    pub fn cell_mut(&mut self, cell: CellCoord) -> &mut Cell {
        assert_eq!(cell.grid(), self.coord, "cell {cell} is not part of grid {}", self.coord);
        &mut self.cells[cell.local_index()]
    }

    /// Number of entities of a kind held in one container type across all cells.
    pub fn count(&self, container: ContainerType, kind: EntityKind) -> usize {
        self.cells.iter().map(|cell| cell.container(container, kind).len()).sum()
    }

    pub fn object_count(&self) -> usize {
        self.cells.iter().map(Cell::len).sum()
    }

    pub fn all_guids(&self) -> Vec<Guid> {
        self.cells.iter().flat_map(Cell::all_guids).collect()
    }
}

/// Arena of grid slots addressed by [`GridCoord`]. A slot is empty or owns a grid.
#[derive(Debug)]
pub struct GridTable {
    slots: Vec<Option<Box<Grid>>>,
    loaded: usize,
}

impl Default for GridTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GridTable {
    pub fn new() -> Self {
        let slot_count = (MAX_NUMBER_OF_GRIDS * MAX_NUMBER_OF_GRIDS) as usize;
        Self {
            slots: (0..slot_count).map(|_| None).collect(),
            loaded: 0,
        }
    }

    pub fn get(&self, coord: GridCoord) -> Option<&Grid> {
        self.slots[coord.index()].as_deref()
    }

    pub fn get_mut(&mut self, coord: GridCoord) -> Option<&mut Grid> {
        self.slots[coord.index()].as_deref_mut()
    }

    /// Places a grid in its slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already occupied.
    pub fn insert(&mut self, grid: Grid) -> &mut Grid {
        let index = grid.coord().index();
        assert!(self.slots[index].is_none(), "grid {} created twice", grid.coord());
        self.loaded += 1;
        self.slots[index].insert(Box::new(grid))
    }

    pub fn remove(&mut self, coord: GridCoord) -> Option<Box<Grid>> {
        let grid = self.slots[coord.index()].take();
        if grid.is_some() {
            self.loaded -= 1;
        }
        grid
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        self.slots[coord.index()].is_some()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded
    }

    pub fn coords(&self) -> Vec<GridCoord> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|grid| grid.coord()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Grid> {
        self.slots.iter().filter_map(|slot| slot.as_deref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Grid> {
        self.slots.iter_mut().filter_map(|slot| slot.as_deref_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HighGuid;

    #[test]
    fn table_tracks_loaded_slots() {
        let mut table = GridTable::new();
        let coord = GridCoord::new(10, 20);
        assert!(!table.contains(coord));
        table.insert(Grid::new(coord, 1000, false));
        assert!(table.contains(coord));
        assert_eq!(table.loaded_count(), 1);
        assert_eq!(table.coords(), vec![coord]);
        assert!(table.remove(coord).is_some());
        assert_eq!(table.loaded_count(), 0);
    }

    #[test]
    #[should_panic(expected = "created twice")]
    fn double_grid_creation_panics() {
        let mut table = GridTable::new();
        table.insert(Grid::new(GridCoord::new(1, 1), 1000, false));
        table.insert(Grid::new(GridCoord::new(1, 1), 1000, false));
    }

    #[test]
    fn grid_counts_cell_contents() {
        let coord = GridCoord::new(32, 32);
        let mut grid = Grid::new(coord, 1000, false);
        let first = coord.cells().next().expect("grid has cells");
        let guid = Guid::new(HighGuid::Unit, 1, 1);
        grid.cell_mut(first).container_mut(ContainerType::Grid, EntityKind::Creature).insert(guid);
        assert_eq!(grid.count(ContainerType::Grid, EntityKind::Creature), 1);
        assert_eq!(grid.object_count(), 1);
        assert_eq!(grid.all_guids(), vec![guid]);
    }
}
