//! # Core Type Definitions
//!
//! Fundamental identifiers and value types shared by every part of the world core.
//!
//! ## Key Types
//!
//! - [`Guid`] - Globally unique entity identifier (kind + entry + counter)
//! - [`HighGuid`] - The entity-kind tag stored in the top 16 bits of a [`Guid`]
//! - [`EntityKind`] - Closed set of entity kinds the grid containers are split by
//! - [`MapKey`] - `(map id, instance id, difficulty)` triple identifying a live map
//! - [`Position`] - Continuous world coordinate with orientation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::error;

/// Persisted spawn identifier (database row id of a creature or game object spawn).
pub type SpawnId = u64;

/// Identifier of a world definition (continent, dungeon template, battleground template).
pub type MapId = u32;

/// Identifier of one live copy of a world definition.
pub type InstanceId = u32;

/// Difficulty mode a map copy runs in. Spawn data is keyed by it; corpses always use `0`.
pub type Difficulty = u8;

/// Identifies one live map: definition, instance copy and difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapKey {
    pub map_id: MapId,
    pub instance_id: InstanceId,
    pub difficulty: Difficulty,
}

impl MapKey {
    pub fn new(map_id: MapId, instance_id: InstanceId, difficulty: Difficulty) -> Self {
        Self { map_id, instance_id, difficulty }
    }

    /// Key of the shared (non-instanced) copy of a continent.
    pub fn continent(map_id: MapId) -> Self {
        Self::new(map_id, 0, 0)
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map {} (instance {}, difficulty {})", self.map_id, self.instance_id, self.difficulty)
    }
}

/// Represents a position in a map: x/y on the grid plane, z height and facing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default)]
    pub orientation: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, orientation: 0.0 }
    }

    pub fn with_orientation(mut self, orientation: f32) -> Self {
        self.orientation = orientation;
        self
    }

    /// Planar distance, used for grid and cell reasoning.
    pub fn distance_2d(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Full euclidean distance, used for sight and search radii.
    pub fn distance(&self, other: &Position) -> f32 {
        let dz = self.z - other.z;
        let planar = self.distance_2d(other);
        (planar * planar + dz * dz).sqrt()
    }
}

/// Closed set of entity kinds. Grid cells keep one container per kind and every
/// visitor dispatches on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Creature,
    GameObject,
    DynamicObject,
    Corpse,
}

impl EntityKind {
    pub const COUNT: usize = 5;

    pub const ALL: [EntityKind; EntityKind::COUNT] = [
        EntityKind::Player,
        EntityKind::Creature,
        EntityKind::GameObject,
        EntityKind::DynamicObject,
        EntityKind::Corpse,
    ];

    /// Position of this kind's container inside a cell.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Object type id written into create blocks.
    pub fn type_id(self) -> u8 {
        match self {
            EntityKind::Player => 4,
            EntityKind::Creature => 3,
            EntityKind::GameObject => 5,
            EntityKind::DynamicObject => 6,
            EntityKind::Corpse => 7,
        }
    }

    pub fn from_type_id(type_id: u8) -> Option<Self> {
        EntityKind::ALL.into_iter().find(|kind| kind.type_id() == type_id)
    }

    pub fn high_guid(self) -> HighGuid {
        match self {
            EntityKind::Player => HighGuid::Player,
            EntityKind::Creature => HighGuid::Unit,
            EntityKind::GameObject => HighGuid::GameObject,
            EntityKind::DynamicObject => HighGuid::DynamicObject,
            EntityKind::Corpse => HighGuid::Corpse,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Player => "player",
            EntityKind::Creature => "creature",
            EntityKind::GameObject => "game object",
            EntityKind::DynamicObject => "dynamic object",
            EntityKind::Corpse => "corpse",
        };
        f.write_str(name)
    }
}

/// Entity-kind tag stored in the high 16 bits of a [`Guid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum HighGuid {
    Player = 0x0000,
    DynamicObject = 0xF100,
    Corpse = 0xF101,
    GameObject = 0xF110,
    Unit = 0xF130,
}

impl HighGuid {
    /// Kinds whose guid also carries the 24-bit template entry.
    pub fn has_entry(self) -> bool {
        matches!(self, HighGuid::Unit | HighGuid::GameObject)
    }

    /// Largest counter value this kind can hand out.
    pub fn max_counter(self) -> u64 {
        if self.has_entry() {
            0x00FF_FFFF
        } else {
            0xFFFF_FFFF
        }
    }

    pub fn kind(self) -> EntityKind {
        match self {
            HighGuid::Player => EntityKind::Player,
            HighGuid::Unit => EntityKind::Creature,
            HighGuid::GameObject => EntityKind::GameObject,
            HighGuid::DynamicObject => EntityKind::DynamicObject,
            HighGuid::Corpse => EntityKind::Corpse,
        }
    }

    fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0x0000 => Some(HighGuid::Player),
            0xF100 => Some(HighGuid::DynamicObject),
            0xF101 => Some(HighGuid::Corpse),
            0xF110 => Some(HighGuid::GameObject),
            0xF130 => Some(HighGuid::Unit),
            _ => None,
        }
    }
}

/// Globally unique entity identifier.
///
/// Layout: `high:16 | entry:24 | counter:24` for kinds carrying an entry, and
/// `high:16 | counter:48` (only the low 32 bits used) for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Guid(pub u64);

impl Guid {
    pub const EMPTY: Guid = Guid(0);

    pub fn new(high: HighGuid, entry: u32, counter: u64) -> Self {
        let high_bits = (high as u64) << 48;
        if high.has_entry() {
            Guid(high_bits | ((entry as u64 & 0x00FF_FFFF) << 24) | (counter & 0x00FF_FFFF))
        } else {
            Guid(high_bits | (counter & 0xFFFF_FFFF))
        }
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn high(self) -> Option<HighGuid> {
        HighGuid::from_raw((self.0 >> 48) as u16)
    }

    /// Entity kind encoded in the guid. Player guids have an all-zero high part, so the
    /// empty guid also decodes as a player.
    pub fn kind(self) -> Option<EntityKind> {
        self.high().map(HighGuid::kind)
    }

    pub fn entry(self) -> u32 {
        match self.high() {
            Some(high) if high.has_entry() => ((self.0 >> 24) & 0x00FF_FFFF) as u32,
            _ => 0,
        }
    }

    pub fn counter(self) -> u64 {
        match self.high() {
            Some(high) if high.has_entry() => self.0 & 0x00FF_FFFF,
            _ => self.0 & 0xFFFF_FFFF,
        }
    }

    /// Low 32 bits, as written into the first guid value field.
    pub fn low_word(self) -> u32 {
        self.0 as u32
    }

    /// High 32 bits, as written into the second guid value field.
    pub fn high_word(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{} 0x{:016X}", kind, self.0),
            None => write!(f, "guid 0x{:016X}", self.0),
        }
    }
}

/// Counter source for one [`HighGuid`] kind.
///
/// Running out of counters leaves no safe way to name new entities, so exhaustion
/// stops the process instead of returning an error.
#[derive(Debug, Clone)]
pub struct GuidGenerator {
    high: HighGuid,
    next: u64,
}

impl GuidGenerator {
    pub fn new(high: HighGuid) -> Self {
        Self::starting_at(high, 1)
    }

    pub fn starting_at(high: HighGuid, next: u64) -> Self {
        Self { high, next: next.max(1) }
    }

    /// Hands out the next counter value.
    ///
    /// # Panics
    ///
    /// Panics when the kind's counter space is exhausted.
    pub fn generate(&mut self) -> u64 {
        if self.next > self.high.max_counter() {
            error!("💥 {:?} guid counter overflow, cannot continue", self.high);
            panic!("guid counter exhausted for {:?}", self.high);
        }
        let counter = self.next;
        self.next += 1;
        counter
    }

    pub fn next_guid(&mut self, entry: u32) -> Guid {
        let counter = self.generate();
        Guid::new(self.high, entry, counter)
    }

    pub fn peek(&self) -> u64 {
        self.next
    }
}

/// Per-kind generators shared by every map, so guids stay unique across maps.
#[derive(Debug)]
pub struct GuidAllocator {
    generators: [Mutex<GuidGenerator>; EntityKind::COUNT],
}

impl Default for GuidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl GuidAllocator {
    pub fn new() -> Self {
        Self {
            generators: EntityKind::ALL.map(|kind| Mutex::new(GuidGenerator::new(kind.high_guid()))),
        }
    }

    /// Next guid of `kind`. `entry` is ignored for kinds without an entry part.
    ///
    /// # Panics
    ///
    /// Panics when the kind's counter space is exhausted.
    pub fn next(&self, kind: EntityKind, entry: u32) -> Guid {
        let mut generator = self.generators[kind.index()].lock().unwrap_or_else(PoisonError::into_inner);
        generator.next_guid(entry)
    }

    /// Counter the next guid of `kind` will carry.
    pub fn peek(&self, kind: EntityKind) -> u64 {
        self.generators[kind.index()].lock().unwrap_or_else(PoisonError::into_inner).peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_packs_entry_for_units() {
        let guid = Guid::new(HighGuid::Unit, 1234, 77);
        assert_eq!(guid.kind(), Some(EntityKind::Creature));
        assert_eq!(guid.entry(), 1234);
        assert_eq!(guid.counter(), 77);
        assert_eq!(guid.high_word() >> 16, 0xF130);
    }

    #[test]
    fn player_guid_has_no_entry() {
        let guid = Guid::new(HighGuid::Player, 999, 42);
        assert_eq!(guid.kind(), Some(EntityKind::Player));
        assert_eq!(guid.entry(), 0);
        assert_eq!(guid.counter(), 42);
        assert_eq!(guid.raw(), 42);
    }

    #[test]
    fn generator_hands_out_sequential_counters() {
        let mut generator = GuidGenerator::new(HighGuid::GameObject);
        let a = generator.next_guid(5);
        let b = generator.next_guid(5);
        assert_eq!(a.counter() + 1, b.counter());
        assert_eq!(a.kind(), Some(EntityKind::GameObject));
    }

    #[test]
    #[should_panic(expected = "guid counter exhausted")]
    fn generator_exhaustion_is_fatal() {
        let mut generator = GuidGenerator::starting_at(HighGuid::Unit, 0x00FF_FFFF);
        generator.generate();
        generator.generate();
    }

    #[test]
    fn allocator_keeps_kinds_separate() {
        let allocator = GuidAllocator::new();
        let unit = allocator.next(EntityKind::Creature, 12);
        let player = allocator.next(EntityKind::Player, 0);
        let unit2 = allocator.next(EntityKind::Creature, 12);
        assert_eq!(unit.kind(), Some(EntityKind::Creature));
        assert_eq!(player.kind(), Some(EntityKind::Player));
        assert_eq!(unit.counter(), 1);
        assert_eq!(unit2.counter(), 2);
        assert_eq!(player.counter(), 1);
    }

    #[test]
    fn type_ids_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_type_id(kind.type_id()), Some(kind));
        }
    }
}
