//! Per-recipient update block builders.
//!
//! A block describes one entity for one recipient. The recipient's relationship to
//! the entity (self, owner, party member, special info) selects which fields are
//! visible; only visible fields are ever written.
//!
//! ## Values block layout
//!
//! ```text
//! u32 presence mask        bit b set → field block b (fields 32b..32b+31) follows
//! u32 field mask × n       one per set presence bit, ascending
//! u32 value × m            one per set field bit, ascending index order
//! u32 dynamic tuple count
//! (u32 index, u32 count, u32 value × count) × tuples
//! ```

use super::buffer::ByteBuffer;
use super::packet::UpdateData;
use crate::object::layout::{OBJECT_FIELD_DYNAMIC_FLAGS, UNIT_DYNFLAG_SPECIALINFO};
use crate::object::{field_flags, layout_for, UpdateMask, WorldObject};
use crate::types::{EntityKind, Guid};

/// Block type tag written before every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateType {
    Values = 0,
    CreateObject = 2,
    OutOfRangeObjects = 4,
    DestroyObjects = 5,
}

impl UpdateType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(UpdateType::Values),
            2 => Some(UpdateType::CreateObject),
            4 => Some(UpdateType::OutOfRangeObjects),
            5 => Some(UpdateType::DestroyObjects),
            _ => None,
        }
    }
}

/// Create-block flag: the block describes the recipient itself.
pub const CREATE_FLAG_SELF: u8 = 0x01;

/// Visibility classes `recipient` belongs to with respect to `target`.
pub fn recipient_flags(target: &WorldObject, recipient: &WorldObject) -> u8 {
    let mut flags = field_flags::PUBLIC;
    if target.guid() == recipient.guid() {
        flags |= field_flags::PRIVATE | field_flags::OWNER | field_flags::PARTY_MEMBER;
    }
    if target.owner_guid() == Some(recipient.guid()) {
        flags |= field_flags::OWNER;
    }
    if let (Some(a), Some(b)) = (target.group_id, recipient.group_id) {
        if a == b {
            flags |= field_flags::PARTY_MEMBER;
        }
    }
    let special_info = matches!(target.kind(), EntityKind::Creature | EntityKind::Player)
        && target.values().has_flag(OBJECT_FIELD_DYNAMIC_FLAGS, UNIT_DYNFLAG_SPECIALINFO);
    if special_info || recipient.is_game_master() {
        flags |= field_flags::SPECIAL_INFO;
    }
    flags
}

fn mask_from_flags(field_flags: &[u8], recipient: u8) -> UpdateMask {
    let mut mask = UpdateMask::new(field_flags.len());
    for (index, &flags) in field_flags.iter().enumerate() {
        if flags & recipient != 0 {
            mask.set(index);
        }
    }
    mask
}

/// Value fields of `kind` a recipient with `recipient` flags may see.
pub fn visible_value_mask(kind: EntityKind, recipient: u8) -> UpdateMask {
    mask_from_flags(layout_for(kind).value_flags, recipient)
}

/// Dynamic fields of `kind` a recipient with `recipient` flags may see.
pub fn visible_dynamic_mask(kind: EntityKind, recipient: u8) -> UpdateMask {
    mask_from_flags(layout_for(kind).dynamic_flags, recipient)
}

/// Writes the values block for the fields in `values` and dynamic indices in `dynamic`.
pub fn write_values_block(buffer: &mut ByteBuffer, object: &WorldObject, values: &UpdateMask, dynamic: &UpdateMask) {
    let mut presence = 0u32;
    for block in 0..values.block_count() {
        if values.block(block) != 0 {
            presence |= 1 << block;
        }
    }
    buffer.put_u32(presence);
    for block in 0..values.block_count() {
        if values.block(block) != 0 {
            buffer.put_u32(values.block(block));
        }
    }
    let raw = object.values().raw();
    for index in values.iter() {
        buffer.put_u32(raw[index]);
    }

    buffer.put_u32(dynamic.count() as u32);
    for index in dynamic.iter() {
        let elements = object.dynamic().get(index);
        buffer.put_u32(index as u32);
        buffer.put_u32(elements.len() as u32);
        for &element in elements {
            buffer.put_u32(element);
        }
    }
}

/// Appends a differential block with the visible dirty fields of `target`.
///
/// Returns `false` and writes nothing when no visible field changed.
pub fn build_values_update_block(target: &WorldObject, recipient: &WorldObject, data: &mut UpdateData) -> bool {
    let flags = recipient_flags(target, recipient);
    let values = visible_value_mask(target.kind(), flags).intersect(target.values().changed());
    let dynamic = visible_dynamic_mask(target.kind(), flags).intersect(target.dynamic().changed());
    if values.is_empty() && dynamic.is_empty() {
        return false;
    }

    let mut buffer = ByteBuffer::new();
    buffer.put_u8(UpdateType::Values as u8);
    buffer.put_guid(target.guid());
    write_values_block(&mut buffer, target, &values, &dynamic);
    data.add_block(buffer);
    true
}

/// Appends a full-state block for a recipient that has no baseline for `target`.
///
/// Every visible non-zero field and every visible non-empty dynamic array is sent;
/// the recipient's baseline before a create block is all zeros.
pub fn build_create_update_block(target: &WorldObject, recipient: &WorldObject, data: &mut UpdateData) {
    let flags = recipient_flags(target, recipient);
    let mut values = visible_value_mask(target.kind(), flags);
    for (index, &value) in target.values().raw().iter().enumerate() {
        if value == 0 {
            values.unset(index);
        }
    }
    let mut dynamic = visible_dynamic_mask(target.kind(), flags);
    for index in 0..target.dynamic().len() {
        if target.dynamic().get(index).is_empty() {
            dynamic.unset(index);
        }
    }

    let position = target.position();
    let mut buffer = ByteBuffer::new();
    buffer.put_u8(UpdateType::CreateObject as u8);
    buffer.put_guid(target.guid());
    buffer.put_u8(target.kind().type_id());
    buffer.put_u8(if target.guid() == recipient.guid() { CREATE_FLAG_SELF } else { 0 });
    buffer.put_f32(position.x);
    buffer.put_f32(position.y);
    buffer.put_f32(position.z);
    buffer.put_f32(position.orientation);
    write_values_block(&mut buffer, target, &values, &dynamic);
    data.add_block(buffer);
}

/// Tells the recipient to forget `guid` without the entity being destroyed.
pub fn build_out_of_range_block(guid: Guid, data: &mut UpdateData) {
    data.add_out_of_range(guid);
}

/// Tells the recipient `guid` no longer exists.
pub fn build_destroy_block(guid: Guid, data: &mut UpdateData) {
    data.add_destroy(guid);
}
