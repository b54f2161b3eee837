//! Per-kind value-field layouts.
//!
//! Each entity kind has a fixed number of value fields and dynamic fields, and each
//! field carries a visibility flag set that decides which recipients may receive it.

use crate::types::EntityKind;

/// Visibility classes a field can belong to. A recipient sees a field when the field's
/// flags intersect the recipient's flag set.
pub mod field_flags {
    pub const NONE: u8 = 0x00;
    pub const PUBLIC: u8 = 0x01;
    pub const PRIVATE: u8 = 0x02;
    pub const OWNER: u8 = 0x04;
    pub const SPECIAL_INFO: u8 = 0x10;
    pub const PARTY_MEMBER: u8 = 0x20;
}

use field_flags::{OWNER, PARTY_MEMBER, PRIVATE, PUBLIC, SPECIAL_INFO};

/// Bits written into `OBJECT_FIELD_TYPE`.
pub mod type_mask {
    pub const OBJECT: u32 = 0x0001;
    pub const UNIT: u32 = 0x0008;
    pub const PLAYER: u32 = 0x0010;
    pub const GAMEOBJECT: u32 = 0x0020;
    pub const DYNAMICOBJECT: u32 = 0x0040;
    pub const CORPSE: u32 = 0x0080;
}

// Object fields, shared by every kind.
pub const OBJECT_FIELD_GUID: usize = 0; // 2 slots
pub const OBJECT_FIELD_TYPE: usize = 2;
pub const OBJECT_FIELD_ENTRY: usize = 3;
pub const OBJECT_FIELD_SCALE_X: usize = 4;
pub const OBJECT_FIELD_DYNAMIC_FLAGS: usize = 5;
pub const OBJECT_END: usize = 6;

// Unit fields, shared by creatures and players.
pub const UNIT_FIELD_CHARMED_BY: usize = OBJECT_END; // 2 slots
pub const UNIT_FIELD_SUMMONED_BY: usize = OBJECT_END + 2; // 2 slots
pub const UNIT_FIELD_CREATED_BY: usize = OBJECT_END + 4; // 2 slots
pub const UNIT_FIELD_TARGET: usize = OBJECT_END + 6; // 2 slots
pub const UNIT_FIELD_HEALTH: usize = OBJECT_END + 8;
pub const UNIT_FIELD_POWER: usize = OBJECT_END + 9;
pub const UNIT_FIELD_MAXHEALTH: usize = OBJECT_END + 10;
pub const UNIT_FIELD_MAXPOWER: usize = OBJECT_END + 11;
pub const UNIT_FIELD_LEVEL: usize = OBJECT_END + 12;
pub const UNIT_FIELD_FACTIONTEMPLATE: usize = OBJECT_END + 13;
pub const UNIT_FIELD_BYTES_0: usize = OBJECT_END + 14;
pub const UNIT_FIELD_FLAGS: usize = OBJECT_END + 15;
pub const UNIT_FIELD_FLAGS_2: usize = OBJECT_END + 16;
pub const UNIT_FIELD_AURASTATE: usize = OBJECT_END + 17;
pub const UNIT_FIELD_DISPLAYID: usize = OBJECT_END + 18;
pub const UNIT_FIELD_BYTES_1: usize = OBJECT_END + 19;
pub const UNIT_NPC_FLAGS: usize = OBJECT_END + 20;
pub const UNIT_FIELD_STAT0: usize = OBJECT_END + 21; // 5 slots
pub const UNIT_FIELD_RESISTANCES: usize = OBJECT_END + 26;
pub const UNIT_FIELD_ATTACK_POWER: usize = OBJECT_END + 27;
pub const UNIT_END: usize = OBJECT_END + 28;

// Player fields.
pub const PLAYER_DUEL_ARBITER: usize = UNIT_END; // 2 slots
pub const PLAYER_FLAGS: usize = UNIT_END + 2;
pub const PLAYER_GUILDID: usize = UNIT_END + 3;
pub const PLAYER_BYTES: usize = UNIT_END + 4;
pub const PLAYER_QUEST_LOG_1: usize = UNIT_END + 5; // 5 slots
pub const PLAYER_XP: usize = UNIT_END + 10;
pub const PLAYER_NEXT_LEVEL_XP: usize = UNIT_END + 11;
pub const PLAYER_FIELD_COINAGE: usize = UNIT_END + 12;
pub const PLAYER_FIELD_WATCHED_FACTION_INDEX: usize = UNIT_END + 13;
pub const PLAYER_FIELD_KILLS: usize = UNIT_END + 14;
pub const PLAYER_END: usize = UNIT_END + 15;

// Game object fields.
pub const GAMEOBJECT_FIELD_CREATED_BY: usize = OBJECT_END; // 2 slots
pub const GAMEOBJECT_DISPLAYID: usize = OBJECT_END + 2;
pub const GAMEOBJECT_FLAGS: usize = OBJECT_END + 3;
pub const GAMEOBJECT_PARENTROTATION: usize = OBJECT_END + 4; // 4 slots
pub const GAMEOBJECT_DYNAMIC: usize = OBJECT_END + 8;
pub const GAMEOBJECT_FACTION: usize = OBJECT_END + 9;
pub const GAMEOBJECT_LEVEL: usize = OBJECT_END + 10;
pub const GAMEOBJECT_BYTES_1: usize = OBJECT_END + 11;
pub const GAMEOBJECT_END: usize = OBJECT_END + 12;

// Dynamic object fields.
pub const DYNAMICOBJECT_CASTER: usize = OBJECT_END; // 2 slots
pub const DYNAMICOBJECT_BYTES: usize = OBJECT_END + 2;
pub const DYNAMICOBJECT_SPELLID: usize = OBJECT_END + 3;
pub const DYNAMICOBJECT_RADIUS: usize = OBJECT_END + 4;
pub const DYNAMICOBJECT_CASTTIME: usize = OBJECT_END + 5;
pub const DYNAMICOBJECT_END: usize = OBJECT_END + 6;

// Corpse fields.
pub const CORPSE_FIELD_OWNER: usize = OBJECT_END; // 2 slots
pub const CORPSE_FIELD_PARTY: usize = OBJECT_END + 2; // 2 slots
pub const CORPSE_FIELD_DISPLAY_ID: usize = OBJECT_END + 4;
pub const CORPSE_FIELD_ITEM: usize = OBJECT_END + 5; // 5 slots
pub const CORPSE_FIELD_BYTES_1: usize = OBJECT_END + 10;
pub const CORPSE_FIELD_FLAGS: usize = OBJECT_END + 11;
pub const CORPSE_FIELD_DYNAMIC_FLAGS: usize = OBJECT_END + 12;
pub const CORPSE_END: usize = OBJECT_END + 13;

// Dynamic fields.
pub const UNIT_DYNAMIC_FIELD_PASSIVE_SPELLS: usize = 0;
pub const UNIT_DYNAMIC_FIELD_WORLD_EFFECTS: usize = 1;
pub const UNIT_DYNAMIC_FIELD_CHANNEL_OBJECTS: usize = 2;
pub const UNIT_DYNAMIC_END: usize = 3;
pub const PLAYER_DYNAMIC_FIELD_RESEARCH_SITES: usize = UNIT_DYNAMIC_END;
pub const PLAYER_DYNAMIC_FIELD_DAILY_QUESTS: usize = UNIT_DYNAMIC_END + 1;
pub const PLAYER_DYNAMIC_END: usize = UNIT_DYNAMIC_END + 2;
pub const GAMEOBJECT_DYNAMIC_FIELD_ENABLE_DOODAD_SETS: usize = 0;
pub const GAMEOBJECT_DYNAMIC_END: usize = 1;

// Flag values stored in the fields above.
pub const UNIT_FLAG_IN_COMBAT: u32 = 0x0008_0000;
pub const UNIT_DYNFLAG_LOOTABLE: u32 = 0x0001;
pub const UNIT_DYNFLAG_DEAD: u32 = 0x0020;
pub const UNIT_DYNFLAG_SPECIALINFO: u32 = 0x0010;
pub const GO_DYNFLAG_HIDDEN: u32 = 0x0001;

const OBJECT_FLAGS: [u8; OBJECT_END] = [PUBLIC; OBJECT_END];

const UNIT_FLAGS: [u8; UNIT_END - OBJECT_END] = [
    PUBLIC, PUBLIC, // charmed by
    PUBLIC, PUBLIC, // summoned by
    PUBLIC, PUBLIC, // created by
    PUBLIC, PUBLIC, // target
    PUBLIC, // health
    PUBLIC, // power
    PUBLIC, // max health
    PUBLIC, // max power
    PUBLIC, // level
    PUBLIC, // faction template
    PUBLIC, // bytes 0
    PUBLIC, // flags
    PUBLIC, // flags 2
    PUBLIC, // aura state
    PUBLIC, // display id
    PUBLIC, // bytes 1
    PUBLIC, // npc flags
    PRIVATE | OWNER, PRIVATE | OWNER, PRIVATE | OWNER, PRIVATE | OWNER, PRIVATE | OWNER, // stats
    PRIVATE | OWNER | SPECIAL_INFO, // resistances
    PRIVATE | OWNER, // attack power
];

const PLAYER_FLAGS_TABLE: [u8; PLAYER_END - UNIT_END] = [
    PUBLIC, PUBLIC, // duel arbiter
    PUBLIC, // player flags
    PUBLIC, // guild id
    PUBLIC, // bytes
    PARTY_MEMBER, PARTY_MEMBER, PARTY_MEMBER, PARTY_MEMBER, PARTY_MEMBER, // quest log
    PRIVATE, // xp
    PRIVATE, // next level xp
    PRIVATE, // coinage
    PRIVATE, // watched faction
    PRIVATE, // kills
];

const GAMEOBJECT_FLAGS_TABLE: [u8; GAMEOBJECT_END - OBJECT_END] = [PUBLIC; GAMEOBJECT_END - OBJECT_END];
const DYNAMICOBJECT_FLAGS_TABLE: [u8; DYNAMICOBJECT_END - OBJECT_END] = [PUBLIC; DYNAMICOBJECT_END - OBJECT_END];
const CORPSE_FLAGS_TABLE: [u8; CORPSE_END - OBJECT_END] = [PUBLIC; CORPSE_END - OBJECT_END];

const UNIT_DYNAMIC_FLAGS: [u8; UNIT_DYNAMIC_END] = [PUBLIC, PUBLIC, PUBLIC];
const PLAYER_DYNAMIC_FLAGS: [u8; PLAYER_DYNAMIC_END] = [PUBLIC, PUBLIC, PUBLIC, PRIVATE, PRIVATE];
const GAMEOBJECT_DYNAMIC_FLAGS: [u8; GAMEOBJECT_DYNAMIC_END] = [PUBLIC];

const fn concat<const A: usize, const B: usize, const N: usize>(a: [u8; A], b: [u8; B]) -> [u8; N] {
    assert!(A + B == N);
    let mut out = [0u8; N];
    let mut i = 0;
    while i < A {
        out[i] = a[i];
        i += 1;
    }
    while i < N {
        out[i] = b[i - A];
        i += 1;
    }
    out
}

const CREATURE_VALUE_FLAGS: [u8; UNIT_END] = concat(OBJECT_FLAGS, UNIT_FLAGS);
const PLAYER_VALUE_FLAGS: [u8; PLAYER_END] = concat(CREATURE_VALUE_FLAGS, PLAYER_FLAGS_TABLE);
const GAMEOBJECT_VALUE_FLAGS: [u8; GAMEOBJECT_END] = concat(OBJECT_FLAGS, GAMEOBJECT_FLAGS_TABLE);
const DYNAMICOBJECT_VALUE_FLAGS: [u8; DYNAMICOBJECT_END] = concat(OBJECT_FLAGS, DYNAMICOBJECT_FLAGS_TABLE);
const CORPSE_VALUE_FLAGS: [u8; CORPSE_END] = concat(OBJECT_FLAGS, CORPSE_FLAGS_TABLE);

/// Field counts and visibility flags of one entity kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldLayout {
    pub value_flags: &'static [u8],
    pub dynamic_flags: &'static [u8],
    pub type_mask: u32,
}

impl FieldLayout {
    pub fn value_count(&self) -> usize {
        self.value_flags.len()
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic_flags.len()
    }
}

static PLAYER_LAYOUT: FieldLayout = FieldLayout {
    value_flags: &PLAYER_VALUE_FLAGS,
    dynamic_flags: &PLAYER_DYNAMIC_FLAGS,
    type_mask: type_mask::OBJECT | type_mask::UNIT | type_mask::PLAYER,
};

static CREATURE_LAYOUT: FieldLayout = FieldLayout {
    value_flags: &CREATURE_VALUE_FLAGS,
    dynamic_flags: &UNIT_DYNAMIC_FLAGS,
    type_mask: type_mask::OBJECT | type_mask::UNIT,
};

static GAMEOBJECT_LAYOUT: FieldLayout = FieldLayout {
    value_flags: &GAMEOBJECT_VALUE_FLAGS,
    dynamic_flags: &GAMEOBJECT_DYNAMIC_FLAGS,
    type_mask: type_mask::OBJECT | type_mask::GAMEOBJECT,
};

static DYNAMICOBJECT_LAYOUT: FieldLayout = FieldLayout {
    value_flags: &DYNAMICOBJECT_VALUE_FLAGS,
    dynamic_flags: &[],
    type_mask: type_mask::OBJECT | type_mask::DYNAMICOBJECT,
};

static CORPSE_LAYOUT: FieldLayout = FieldLayout {
    value_flags: &CORPSE_VALUE_FLAGS,
    dynamic_flags: &[],
    type_mask: type_mask::OBJECT | type_mask::CORPSE,
};

pub fn layout_for(kind: EntityKind) -> &'static FieldLayout {
    match kind {
        EntityKind::Player => &PLAYER_LAYOUT,
        EntityKind::Creature => &CREATURE_LAYOUT,
        EntityKind::GameObject => &GAMEOBJECT_LAYOUT,
        EntityKind::DynamicObject => &DYNAMICOBJECT_LAYOUT,
        EntityKind::Corpse => &CORPSE_LAYOUT,
    }
}
