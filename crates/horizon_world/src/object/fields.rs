//! Value-field storage with change tracking.
//!
//! Every entity owns a fixed array of 32-bit slots. Typed accessors reinterpret the
//! bits explicitly at the boundary (`f32::from_bits`, byte shifts), so there is no
//! aliasing between the storage and the typed views.
//!
//! Two write flavours exist on purpose:
//!
//! - `set_*` always marks the slot dirty, even when the stored bits are unchanged.
//! - `update_*` compares first and is a no-op when nothing changes.

use crate::types::Guid;
use smallvec::SmallVec;

/// Bitset over field indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMask {
    words: Vec<u32>,
    bits: usize,
}

impl UpdateMask {
    pub fn new(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(32)],
            bits,
        }
    }

    pub fn bit_count(&self) -> usize {
        self.bits
    }

    /// Number of 32-field blocks the mask spans.
    pub fn block_count(&self) -> usize {
        self.words.len()
    }

    pub fn block(&self, block: usize) -> u32 {
        self.words[block]
    }

    pub fn set(&mut self, index: usize) {
        assert!(index < self.bits, "update mask index {index} out of range ({})", self.bits);
        self.words[index / 32] |= 1 << (index % 32);
    }

    pub fn unset(&mut self, index: usize) {
        assert!(index < self.bits, "update mask index {index} out of range ({})", self.bits);
        self.words[index / 32] &= !(1 << (index % 32));
    }

    pub fn get(&self, index: usize) -> bool {
        index < self.bits && self.words[index / 32] & (1 << (index % 32)) != 0
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|word| *word = 0);
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Bitwise AND with another mask of the same size.
    pub fn intersect(&self, other: &UpdateMask) -> UpdateMask {
        debug_assert_eq!(self.bits, other.bits);
        UpdateMask {
            words: self.words.iter().zip(&other.words).map(|(a, b)| a & b).collect(),
            bits: self.bits,
        }
    }

    /// Set indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(block, &word)| {
            (0..32).filter(move |bit| word & (1 << bit) != 0).map(move |bit| block * 32 + bit)
        })
    }
}

/// Fixed array of 32-bit value slots plus its dirty mask.
#[derive(Debug, Clone)]
pub struct ValueFields {
    values: Vec<u32>,
    changed: UpdateMask,
}

impl ValueFields {
    pub fn new(count: usize) -> Self {
        Self {
            values: vec![0; count],
            changed: UpdateMask::new(count),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn check(&self, index: usize) {
        assert!(
            index < self.values.len(),
            "value field index {index} out of range ({} fields)",
            self.values.len()
        );
    }

    pub fn raw(&self) -> &[u32] {
        &self.values
    }

    pub fn changed(&self) -> &UpdateMask {
        &self.changed
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn mark_changed(&mut self, index: usize) {
        self.check(index);
        self.changed.set(index);
    }

    pub fn clear_changes(&mut self) {
        self.changed.clear();
    }

    // ---- reads ----

    pub fn get_u32(&self, index: usize) -> u32 {
        self.check(index);
        self.values[index]
    }

    pub fn get_i32(&self, index: usize) -> i32 {
        self.get_u32(index) as i32
    }

    pub fn get_f32(&self, index: usize) -> f32 {
        f32::from_bits(self.get_u32(index))
    }

    /// Reads two consecutive slots, low word first.
    pub fn get_u64(&self, index: usize) -> u64 {
        self.check(index + 1);
        (self.values[index] as u64) | ((self.values[index + 1] as u64) << 32)
    }

    pub fn get_guid(&self, index: usize) -> Guid {
        Guid(self.get_u64(index))
    }

    pub fn get_u8(&self, index: usize, offset: u8) -> u8 {
        assert!(offset < 4, "byte offset {offset} out of range");
        (self.get_u32(index) >> (offset as u32 * 8)) as u8
    }

    pub fn get_u16(&self, index: usize, offset: u8) -> u16 {
        assert!(offset < 2, "half-word offset {offset} out of range");
        (self.get_u32(index) >> (offset as u32 * 16)) as u16
    }

    // ---- forced writes ----

    pub fn set_u32(&mut self, index: usize, value: u32) {
        self.check(index);
        self.values[index] = value;
        self.changed.set(index);
    }

    pub fn set_i32(&mut self, index: usize, value: i32) {
        self.set_u32(index, value as u32);
    }

    pub fn set_f32(&mut self, index: usize, value: f32) {
        self.set_u32(index, value.to_bits());
    }

    pub fn set_u64(&mut self, index: usize, value: u64) {
        self.check(index + 1);
        self.set_u32(index, value as u32);
        self.set_u32(index + 1, (value >> 32) as u32);
    }

    pub fn set_guid(&mut self, index: usize, guid: Guid) {
        self.set_u64(index, guid.raw());
    }

    pub fn set_u8(&mut self, index: usize, offset: u8, value: u8) {
        assert!(offset < 4, "byte offset {offset} out of range");
        let shift = offset as u32 * 8;
        let current = self.get_u32(index);
        self.set_u32(index, (current & !(0xFF << shift)) | ((value as u32) << shift));
    }

    pub fn set_u16(&mut self, index: usize, offset: u8, value: u16) {
        assert!(offset < 2, "half-word offset {offset} out of range");
        let shift = offset as u32 * 16;
        let current = self.get_u32(index);
        self.set_u32(index, (current & !(0xFFFF << shift)) | ((value as u32) << shift));
    }

    // ---- compare-and-set writes ----

    /// Writes only if the value differs. Returns whether a write happened.
    pub fn update_u32(&mut self, index: usize, value: u32) -> bool {
        if self.get_u32(index) == value {
            return false;
        }
        self.set_u32(index, value);
        true
    }

    pub fn update_i32(&mut self, index: usize, value: i32) -> bool {
        self.update_u32(index, value as u32)
    }

    pub fn update_f32(&mut self, index: usize, value: f32) -> bool {
        self.update_u32(index, value.to_bits())
    }

    pub fn update_u64(&mut self, index: usize, value: u64) -> bool {
        if self.get_u64(index) == value {
            return false;
        }
        self.set_u64(index, value);
        true
    }

    pub fn update_guid(&mut self, index: usize, guid: Guid) -> bool {
        self.update_u64(index, guid.raw())
    }

    pub fn update_u8(&mut self, index: usize, offset: u8, value: u8) -> bool {
        if self.get_u8(index, offset) == value {
            return false;
        }
        self.set_u8(index, offset, value);
        true
    }

    pub fn update_u16(&mut self, index: usize, offset: u8, value: u16) -> bool {
        if self.get_u16(index, offset) == value {
            return false;
        }
        self.set_u16(index, offset, value);
        true
    }

    // ---- flags ----

    pub fn has_flag(&self, index: usize, flag: u32) -> bool {
        self.get_u32(index) & flag != 0
    }

    pub fn set_flag(&mut self, index: usize, flag: u32) {
        let value = self.get_u32(index) | flag;
        self.set_u32(index, value);
    }

    pub fn remove_flag(&mut self, index: usize, flag: u32) {
        let value = self.get_u32(index) & !flag;
        self.set_u32(index, value);
    }

    pub fn toggle_flag(&mut self, index: usize, flag: u32) {
        let value = self.get_u32(index) ^ flag;
        self.set_u32(index, value);
    }

    pub fn apply_flag(&mut self, index: usize, flag: u32, apply: bool) {
        if apply {
            self.set_flag(index, flag);
        } else {
            self.remove_flag(index, flag);
        }
    }

    pub fn has_byte_flag(&self, index: usize, offset: u8, flag: u8) -> bool {
        self.get_u8(index, offset) & flag != 0
    }

    pub fn set_byte_flag(&mut self, index: usize, offset: u8, flag: u8) {
        let value = self.get_u8(index, offset) | flag;
        self.set_u8(index, offset, value);
    }

    pub fn remove_byte_flag(&mut self, index: usize, offset: u8, flag: u8) {
        let value = self.get_u8(index, offset) & !flag;
        self.set_u8(index, offset, value);
    }

    pub fn toggle_byte_flag(&mut self, index: usize, offset: u8, flag: u8) {
        let value = self.get_u8(index, offset) ^ flag;
        self.set_u8(index, offset, value);
    }

    pub fn has_flag64(&self, index: usize, flag: u64) -> bool {
        self.get_u64(index) & flag != 0
    }

    pub fn set_flag64(&mut self, index: usize, flag: u64) {
        let value = self.get_u64(index) | flag;
        self.set_u64(index, value);
    }

    pub fn remove_flag64(&mut self, index: usize, flag: u64) {
        let value = self.get_u64(index) & !flag;
        self.set_u64(index, value);
    }

    pub fn toggle_flag64(&mut self, index: usize, flag: u64) {
        let value = self.get_u64(index) ^ flag;
        self.set_u64(index, value);
    }
}

/// Variable-length per-index arrays with their own dirty mask.
#[derive(Debug, Clone)]
pub struct DynamicFields {
    arrays: Vec<SmallVec<[u32; 4]>>,
    changed: UpdateMask,
}

impl DynamicFields {
    pub fn new(count: usize) -> Self {
        Self {
            arrays: vec![SmallVec::new(); count],
            changed: UpdateMask::new(count),
        }
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    fn check(&self, index: usize) {
        assert!(
            index < self.arrays.len(),
            "dynamic field index {index} out of range ({} fields)",
            self.arrays.len()
        );
    }

    pub fn get(&self, index: usize) -> &[u32] {
        self.check(index);
        &self.arrays[index]
    }

    pub fn changed(&self) -> &UpdateMask {
        &self.changed
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn clear_changes(&mut self) {
        self.changed.clear();
    }

    /// Replaces the whole array and marks it dirty.
    pub fn set(&mut self, index: usize, values: &[u32]) {
        self.check(index);
        self.arrays[index] = SmallVec::from_slice(values);
        self.changed.set(index);
    }

    pub fn push(&mut self, index: usize, value: u32) {
        self.check(index);
        self.arrays[index].push(value);
        self.changed.set(index);
    }

    /// Writes one element, growing the array with zeros when needed.
    pub fn set_value(&mut self, index: usize, position: usize, value: u32) {
        self.check(index);
        let array = &mut self.arrays[index];
        if array.len() <= position {
            array.resize(position + 1, 0);
        }
        array[position] = value;
        self.changed.set(index);
    }

    /// Removes the first element equal to `value`.
    pub fn remove_value(&mut self, index: usize, value: u32) -> bool {
        self.check(index);
        let array = &mut self.arrays[index];
        match array.iter().position(|&v| v == value) {
            Some(position) => {
                array.remove(position);
                self.changed.set(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, index: usize) {
        self.check(index);
        self.arrays[index].clear();
        self.changed.set(index);
    }
}
