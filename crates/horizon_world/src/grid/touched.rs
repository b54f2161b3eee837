//! Map-wide bitset of cells visited during the current tick.

use super::coords::{CellCoord, TOTAL_NUMBER_OF_CELLS_PER_MAP};

const WORDS: usize = (TOTAL_NUMBER_OF_CELLS_PER_MAP * TOTAL_NUMBER_OF_CELLS_PER_MAP / 64) as usize;

/// One bit per map cell. Area visits mark cells so that each cell is walked once
/// per tick; the set is reset at the start of every map update.
#[derive(Debug, Clone)]
pub struct CellTouchSet {
    words: Vec<u64>,
    marked: usize,
}

impl Default for CellTouchSet {
    fn default() -> Self {
        Self {
            words: vec![0; WORDS],
            marked: 0,
        }
    }
}

impl CellTouchSet {
    /// Marks a cell, returning `false` if it was already marked.
    pub fn mark(&mut self, cell: CellCoord) -> bool {
        let id = cell.id() as usize;
        let bit = 1u64 << (id % 64);
        let word = &mut self.words[id / 64];
        if *word & bit != 0 {
            return false;
        }
        *word |= bit;
        self.marked += 1;
        true
    }

    pub fn is_marked(&self, cell: CellCoord) -> bool {
        let id = cell.id() as usize;
        self.words[id / 64] & (1u64 << (id % 64)) != 0
    }

    pub fn marked_count(&self) -> usize {
        self.marked
    }

    pub fn reset(&mut self) {
        if self.marked > 0 {
            self.words.iter_mut().for_each(|word| *word = 0);
            self.marked = 0;
        }
    }
}
