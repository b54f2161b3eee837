//! Client-side reconstruction of replicated state.
//!
//! Applies decoded blocks the way a client would. A values block for an entity the
//! mirror has no baseline for is rejected, which is what keeps the differential
//! path honest in tests.

use super::packet::{decode_packet, FieldUpdate, UpdateBlock};
use crate::error::DecodeError;
use crate::object::layout_for;
use crate::types::{EntityKind, Guid, Position};
use std::collections::HashMap;

/// One entity as known by a recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct MirroredObject {
    pub kind: EntityKind,
    pub position: Position,
    pub values: Vec<u32>,
    pub dynamic: Vec<Vec<u32>>,
}

impl MirroredObject {
    fn new(kind: EntityKind, position: Position) -> Self {
        let layout = layout_for(kind);
        Self {
            kind,
            position,
            values: vec![0; layout.value_count()],
            dynamic: vec![Vec::new(); layout.dynamic_count()],
        }
    }

    /// Rejects indices past the kind's layout before anything is written.
    fn check_bounds(&self, guid: Guid, fields: &FieldUpdate) -> Result<(), DecodeError> {
        let value_limit = self.values.len();
        if let Some(&(index, _)) = fields.values.iter().find(|(index, _)| *index >= value_limit) {
            return Err(DecodeError::FieldOutOfRange { guid, index, limit: value_limit });
        }
        let dynamic_limit = self.dynamic.len();
        if let Some((index, _)) = fields.dynamic.iter().find(|(index, _)| *index >= dynamic_limit) {
            return Err(DecodeError::FieldOutOfRange { guid, index: *index, limit: dynamic_limit });
        }
        Ok(())
    }

    fn apply(&mut self, guid: Guid, fields: FieldUpdate) -> Result<(), DecodeError> {
        self.check_bounds(guid, &fields)?;
        for (index, value) in fields.values {
            self.values[index] = value;
        }
        for (index, elements) in fields.dynamic {
            self.dynamic[index] = elements;
        }
        Ok(())
    }

    pub fn value(&self, index: usize) -> u32 {
        self.values.get(index).copied().unwrap_or(0)
    }
}

/// Every entity a recipient currently knows about.
#[derive(Debug, Default)]
pub struct ObjectMirror {
    objects: HashMap<Guid, MirroredObject>,
    creates: usize,
}

impl ObjectMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_packet(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        let decoded = decode_packet(bytes)?;
        for block in decoded.blocks {
            self.apply(block)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, block: UpdateBlock) -> Result<(), DecodeError> {
        match block {
            UpdateBlock::Create { guid, kind, position, fields, .. } => {
                let mut object = MirroredObject::new(kind, position);
                object.apply(guid, fields)?;
                self.objects.insert(guid, object);
                self.creates += 1;
            }
            UpdateBlock::Values { guid, fields } => {
                let object = self.objects.get_mut(&guid).ok_or(DecodeError::MissingBaseline(guid))?;
                object.apply(guid, fields)?;
            }
            UpdateBlock::OutOfRange(guids) | UpdateBlock::Destroy(guids) => {
                for guid in guids {
                    self.objects.remove(&guid);
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, guid: Guid) -> Option<&MirroredObject> {
        self.objects.get(&guid)
    }

    pub fn contains(&self, guid: Guid) -> bool {
        self.objects.contains_key(&guid)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Create blocks applied so far.
    pub fn create_count(&self) -> usize {
        self.creates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HighGuid;

    #[test]
    fn values_without_baseline_are_rejected() {
        let mut mirror = ObjectMirror::new();
        let guid = Guid::new(HighGuid::Unit, 1, 1);
        let result = mirror.apply(UpdateBlock::Values { guid, fields: FieldUpdate::default() });
        assert_eq!(result, Err(DecodeError::MissingBaseline(guid)));
    }

    #[test]
    fn oversized_indices_are_rejected() {
        let mut mirror = ObjectMirror::new();
        let guid = Guid::new(HighGuid::Unit, 1, 1);
        let limit = layout_for(EntityKind::Creature).value_count();
        let oversized = UpdateBlock::Create {
            guid,
            kind: EntityKind::Creature,
            is_self: false,
            position: Position::default(),
            fields: FieldUpdate { values: vec![(limit, 1)], dynamic: Vec::new() },
        };
        assert_eq!(mirror.apply(oversized), Err(DecodeError::FieldOutOfRange { guid, index: limit, limit }));
        assert!(mirror.is_empty());

        mirror
            .apply(UpdateBlock::Create {
                guid,
                kind: EntityKind::Creature,
                is_self: false,
                position: Position::default(),
                fields: FieldUpdate { values: vec![(5, 10)], dynamic: Vec::new() },
            })
            .expect("create applies");

        // Dynamic index near u32::MAX straight off the wire.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&guid.raw().to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&(u32::MAX - 1).to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&9u32.to_le_bytes());
        let result = mirror.apply_packet(&bytes);
        assert!(matches!(result, Err(DecodeError::FieldOutOfRange { index, .. }) if index == (u32::MAX - 1) as usize));
        assert_eq!(mirror.get(guid).map(|object| object.value(5)), Some(10));
    }

    #[test]
    fn create_then_forget() {
        let mut mirror = ObjectMirror::new();
        let guid = Guid::new(HighGuid::Unit, 1, 1);
        mirror
            .apply(UpdateBlock::Create {
                guid,
                kind: EntityKind::Creature,
                is_self: false,
                position: Position::default(),
                fields: FieldUpdate { values: vec![(5, 10)], dynamic: vec![(2, vec![7, 8])] },
            })
            .expect("create applies");
        let object = mirror.get(guid).expect("mirrored");
        assert_eq!(object.value(5), 10);
        assert_eq!(object.dynamic[2], vec![7, 8]);
        mirror.apply(UpdateBlock::OutOfRange(vec![guid])).expect("out of range applies");
        assert!(mirror.is_empty());
        assert_eq!(mirror.create_count(), 1);
    }
}
