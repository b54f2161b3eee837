//! The per-recipient update packet and its decoder.
//!
//! ```text
//! u32 map id
//! u32 block count
//! block × count
//! ```
//!
//! Out-of-range and destroy guids are collected across the tick and written as one
//! trailing block each: `u8 type, u32 count, u64 guid × count`.

use super::block::UpdateType;
use super::buffer::{ByteBuffer, ByteReader};
use crate::error::DecodeError;
use crate::types::{EntityKind, Guid, MapId, Position};

/// Blocks queued for one recipient during one tick.
#[derive(Debug, Clone)]
pub struct UpdateData {
    map_id: MapId,
    block_count: u32,
    blocks: ByteBuffer,
    out_of_range: Vec<Guid>,
    destroyed: Vec<Guid>,
}

impl UpdateData {
    pub fn new(map_id: MapId) -> Self {
        Self {
            map_id,
            block_count: 0,
            blocks: ByteBuffer::new(),
            out_of_range: Vec::new(),
            destroyed: Vec::new(),
        }
    }

    pub fn map_id(&self) -> MapId {
        self.map_id
    }

    pub(crate) fn add_block(&mut self, block: ByteBuffer) {
        self.blocks.put_bytes(block.as_slice());
        self.block_count += 1;
    }

    pub fn add_out_of_range(&mut self, guid: Guid) {
        if !self.out_of_range.contains(&guid) {
            self.out_of_range.push(guid);
        }
    }

    pub fn add_destroy(&mut self, guid: Guid) {
        if !self.destroyed.contains(&guid) {
            self.destroyed.push(guid);
        }
    }

    /// Number of create and values blocks queued.
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    pub fn out_of_range(&self) -> &[Guid] {
        &self.out_of_range
    }

    pub fn destroyed(&self) -> &[Guid] {
        &self.destroyed
    }

    pub fn has_data(&self) -> bool {
        self.block_count > 0 || !self.out_of_range.is_empty() || !self.destroyed.is_empty()
    }

    /// Encodes the packet handed to the transport.
    pub fn build_packet(&self) -> Vec<u8> {
        let trailing = u32::from(!self.out_of_range.is_empty()) + u32::from(!self.destroyed.is_empty());
        let mut packet = ByteBuffer::with_capacity(8 + self.blocks.len() + 16 * trailing as usize);
        packet.put_u32(self.map_id);
        packet.put_u32(self.block_count + trailing);
        packet.put_bytes(self.blocks.as_slice());
        for (update_type, guids) in [
            (UpdateType::OutOfRangeObjects, &self.out_of_range),
            (UpdateType::DestroyObjects, &self.destroyed),
        ] {
            if guids.is_empty() {
                continue;
            }
            packet.put_u8(update_type as u8);
            packet.put_u32(guids.len() as u32);
            for &guid in guids {
                packet.put_guid(guid);
            }
        }
        packet.into_vec()
    }
}

/// Field payload of a create or values block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUpdate {
    /// `(index, raw value)` in ascending index order.
    pub values: Vec<(usize, u32)>,
    /// `(dynamic index, elements)` per dirty dynamic index.
    pub dynamic: Vec<(usize, Vec<u32>)>,
}

/// One decoded block.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateBlock {
    Create {
        guid: Guid,
        kind: EntityKind,
        is_self: bool,
        position: Position,
        fields: FieldUpdate,
    },
    Values {
        guid: Guid,
        fields: FieldUpdate,
    },
    OutOfRange(Vec<Guid>),
    Destroy(Vec<Guid>),
}

/// A decoded packet.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedUpdate {
    pub map_id: MapId,
    pub blocks: Vec<UpdateBlock>,
}

fn read_fields(reader: &mut ByteReader<'_>) -> Result<FieldUpdate, DecodeError> {
    let presence = reader.read_u32()?;
    let mut masks = Vec::new();
    for block in 0..32 {
        if presence & (1 << block) != 0 {
            masks.push((block, reader.read_u32()?));
        }
    }
    let mut fields = FieldUpdate::default();
    for (block, mask) in masks {
        for bit in 0..32 {
            if mask & (1 << bit) != 0 {
                fields.values.push((block * 32 + bit, reader.read_u32()?));
            }
        }
    }
    let tuples = reader.read_u32()?;
    for _ in 0..tuples {
        let index = reader.read_u32()? as usize;
        let count = reader.read_u32()? as usize;
        let needed = count.saturating_mul(4);
        if needed > reader.remaining() {
            return Err(DecodeError::UnexpectedEof {
                offset: reader.offset(),
                needed: needed - reader.remaining(),
            });
        }
        let mut elements = Vec::with_capacity(count);
        for _ in 0..count {
            elements.push(reader.read_u32()?);
        }
        fields.dynamic.push((index, elements));
    }
    Ok(fields)
}

fn read_guid_list(reader: &mut ByteReader<'_>) -> Result<Vec<Guid>, DecodeError> {
    let count = reader.read_u32()? as usize;
    let mut guids = Vec::with_capacity(count.min(reader.remaining() / 8));
    for _ in 0..count {
        guids.push(reader.read_guid()?);
    }
    Ok(guids)
}

/// Decodes a packet produced by [`UpdateData::build_packet`].
pub fn decode_packet(bytes: &[u8]) -> Result<DecodedUpdate, DecodeError> {
    let mut reader = ByteReader::new(bytes);
    let map_id = reader.read_u32()?;
    let count = reader.read_u32()?;
    let mut blocks = Vec::new();
    for _ in 0..count {
        let raw_type = reader.read_u8()?;
        let block = match UpdateType::from_u8(raw_type).ok_or(DecodeError::UnknownUpdateType(raw_type))? {
            UpdateType::Values => {
                let guid = reader.read_guid()?;
                UpdateBlock::Values { guid, fields: read_fields(&mut reader)? }
            }
            UpdateType::CreateObject => {
                let guid = reader.read_guid()?;
                let type_id = reader.read_u8()?;
                let kind = EntityKind::from_type_id(type_id).ok_or(DecodeError::UnknownObjectType(type_id))?;
                let flags = reader.read_u8()?;
                let position = Position {
                    x: reader.read_f32()?,
                    y: reader.read_f32()?,
                    z: reader.read_f32()?,
                    orientation: reader.read_f32()?,
                };
                UpdateBlock::Create {
                    guid,
                    kind,
                    is_self: flags & super::block::CREATE_FLAG_SELF != 0,
                    position,
                    fields: read_fields(&mut reader)?,
                }
            }
            UpdateType::OutOfRangeObjects => UpdateBlock::OutOfRange(read_guid_list(&mut reader)?),
            UpdateType::DestroyObjects => UpdateBlock::Destroy(read_guid_list(&mut reader)?),
        };
        blocks.push(block);
    }
    Ok(DecodedUpdate { map_id, blocks })
}
