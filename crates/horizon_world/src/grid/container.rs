//! Unordered vector with O(1) removal by value.
//!
//! Removal swaps the last element into the freed slot, and the position index is
//! patched for the element that moved. Order is not preserved.

use std::collections::HashMap;
use std::hash::Hash;

/// Unordered container that tracks the slot of each element.
#[derive(Debug, Clone)]
pub struct IndexedVec<T> {
    items: Vec<T>,
    slots: HashMap<T, usize>,
}

impl<T> Default for IndexedVec<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            slots: HashMap::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> IndexedVec<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an element. Returns `false` when it is already present.
    pub fn insert(&mut self, item: T) -> bool {
        if self.slots.contains_key(&item) {
            return false;
        }
        self.slots.insert(item, self.items.len());
        self.items.push(item);
        true
    }

    /// Removes an element by swapping the last one into its slot.
    pub fn remove(&mut self, item: &T) -> bool {
        let Some(slot) = self.slots.remove(item) else {
            return false;
        };
        self.items.swap_remove(slot);
        if let Some(moved) = self.items.get(slot) {
            self.slots.insert(*moved, slot);
        }
        true
    }

    /// Removes and returns the element at the front slot.
    pub fn pop_front(&mut self) -> Option<T> {
        let first = *self.items.first()?;
        self.remove(&first);
        Some(first)
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.items.get(index).copied()
    }

    pub fn position(&self, item: &T) -> Option<usize> {
        self.slots.get(item).copied()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.slots.contains_key(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_patches_moved_slot() {
        let mut items = IndexedVec::new();
        for value in [10u64, 20, 30, 40] {
            assert!(items.insert(value));
        }
        assert!(items.remove(&20));
        assert_eq!(items.len(), 3);
        assert_eq!(items.position(&40), Some(1));
        assert_eq!(items.get(1), Some(40));
        assert!(!items.contains(&20));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut items = IndexedVec::new();
        assert!(items.insert(7u64));
        assert!(!items.insert(7u64));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn pop_front_drains_everything() {
        let mut items = IndexedVec::new();
        for value in 0u64..5 {
            items.insert(value);
        }
        let mut drained = Vec::new();
        while let Some(value) = items.pop_front() {
            drained.push(value);
        }
        drained.sort_unstable();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(items.is_empty());
    }
}
