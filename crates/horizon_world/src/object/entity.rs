//! The world entity: value fields, position, membership state and kind-specific data.

use super::fields::{DynamicFields, ValueFields};
use super::layout::*;
use crate::grid::{CellCoord, ContainerType};
use crate::types::{EntityKind, Guid, MapKey, Position, SpawnId};
use crate::visibility::VisibilityState;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Phase every entity starts in.
pub const PHASEMASK_NORMAL: u32 = 0x0000_0001;

/// Where a persisted entity belongs when it is (re)created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnInfo {
    pub spawn_id: SpawnId,
    pub home: Position,
    pub respawn_delay_secs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathState {
    Alive,
    JustDied,
    Corpse,
    Dead,
}

/// Threat table and combat flags of a creature.
#[derive(Debug, Clone, Default)]
pub struct CombatState {
    pub in_combat: bool,
    pub threat: HashMap<Guid, f32>,
    pub evading: bool,
    /// Held while a forced evade runs so the creature cannot re-engage mid-reset.
    pub ai_locked: bool,
}

#[derive(Debug, Clone)]
pub struct PlayerData {
    pub name: String,
    pub game_master: bool,
    /// Guids this player's client currently has a baseline for.
    pub(crate) client_guids: HashSet<Guid>,
}

#[derive(Debug, Clone)]
pub struct CreatureData {
    pub spawn: Option<SpawnInfo>,
    pub death_state: DeathState,
    pub combat: CombatState,
}

#[derive(Debug, Clone)]
pub struct GameObjectData {
    pub spawn: Option<SpawnInfo>,
    pub spawned: bool,
}

#[derive(Debug, Clone)]
pub struct DynamicObjectData {
    pub caster: Guid,
    pub spell_id: u32,
    pub radius: f32,
    /// `None` lasts until removed explicitly.
    pub remaining_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CorpseData {
    pub owner: Guid,
}

/// Kind-specific state. The variant always matches [`WorldObject::kind`].
#[derive(Debug, Clone)]
pub enum KindData {
    Player(PlayerData),
    Creature(CreatureData),
    GameObject(GameObjectData),
    DynamicObject(DynamicObjectData),
    Corpse(CorpseData),
}

impl KindData {
    pub fn kind(&self) -> EntityKind {
        match self {
            KindData::Player(_) => EntityKind::Player,
            KindData::Creature(_) => EntityKind::Creature,
            KindData::GameObject(_) => EntityKind::GameObject,
            KindData::DynamicObject(_) => EntityKind::DynamicObject,
            KindData::Corpse(_) => EntityKind::Corpse,
        }
    }
}

/// Cross-references between entities. Severed before an entity is deleted.
#[derive(Debug, Clone, Default)]
pub struct ObjectLinks {
    pub summoner: Option<Guid>,
    pub summons: Vec<Guid>,
    /// Casters of auras currently applied to this entity.
    pub aura_casters: Vec<Guid>,
    /// Entities carrying auras this entity cast.
    pub aura_targets: Vec<Guid>,
    /// Area effects (dynamic objects) this entity created.
    pub area_effects: Vec<Guid>,
}

/// Where an entity sits in its map's grid storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSlot {
    pub cell: CellCoord,
    pub container: ContainerType,
}

/// An entity that can live in a map.
#[derive(Debug, Clone)]
pub struct WorldObject {
    guid: Guid,
    kind: EntityKind,
    values: ValueFields,
    dynamic: DynamicFields,
    position: Position,
    phase_mask: u32,
    in_world: bool,
    map: Option<MapKey>,
    grid_slot: Option<GridSlot>,
    always_active: bool,
    far_visible: bool,
    pub visibility: VisibilityState,
    pub group_id: Option<u32>,
    pub links: ObjectLinks,
    pub data: KindData,
}

impl WorldObject {
    fn new(guid: Guid, position: Position, data: KindData) -> Self {
        let kind = data.kind();
        debug_assert_eq!(guid.kind(), Some(kind), "guid {guid} does not match kind {kind}");
        let layout = layout_for(kind);
        let mut values = ValueFields::new(layout.value_count());
        values.set_guid(OBJECT_FIELD_GUID, guid);
        values.set_u32(OBJECT_FIELD_TYPE, layout.type_mask);
        values.set_u32(OBJECT_FIELD_ENTRY, guid.entry());
        values.set_f32(OBJECT_FIELD_SCALE_X, 1.0);
        Self {
            guid,
            kind,
            values,
            dynamic: DynamicFields::new(layout.dynamic_count()),
            position,
            phase_mask: PHASEMASK_NORMAL,
            in_world: false,
            map: None,
            grid_slot: None,
            always_active: false,
            far_visible: false,
            visibility: VisibilityState::default(),
            group_id: None,
            links: ObjectLinks::default(),
            data,
        }
    }

    fn init_unit_fields(&mut self, level: u32, health: u32) {
        self.values.set_u32(UNIT_FIELD_LEVEL, level);
        self.values.set_u32(UNIT_FIELD_HEALTH, health);
        self.values.set_u32(UNIT_FIELD_MAXHEALTH, health);
    }

    pub fn player(guid: Guid, name: impl Into<String>, position: Position) -> Self {
        let mut object = Self::new(
            guid,
            position,
            KindData::Player(PlayerData {
                name: name.into(),
                game_master: false,
                client_guids: HashSet::new(),
            }),
        );
        object.init_unit_fields(1, 100);
        object.clear_update_mask();
        object
    }

    pub fn creature(guid: Guid, position: Position, spawn: Option<SpawnInfo>) -> Self {
        let mut object = Self::new(
            guid,
            position,
            KindData::Creature(CreatureData {
                spawn,
                death_state: DeathState::Alive,
                combat: CombatState::default(),
            }),
        );
        object.init_unit_fields(1, 100);
        object.clear_update_mask();
        object
    }

    pub fn game_object(guid: Guid, position: Position, spawn: Option<SpawnInfo>) -> Self {
        let mut object = Self::new(guid, position, KindData::GameObject(GameObjectData { spawn, spawned: true }));
        object.values.set_f32(GAMEOBJECT_PARENTROTATION + 3, 1.0);
        object.clear_update_mask();
        object
    }

    pub fn dynamic_object(
        guid: Guid,
        caster: Guid,
        spell_id: u32,
        radius: f32,
        duration_ms: Option<u64>,
        position: Position,
    ) -> Self {
        let mut object = Self::new(
            guid,
            position,
            KindData::DynamicObject(DynamicObjectData {
                caster,
                spell_id,
                radius,
                remaining_ms: duration_ms,
            }),
        );
        object.values.set_guid(DYNAMICOBJECT_CASTER, caster);
        object.values.set_u32(DYNAMICOBJECT_SPELLID, spell_id);
        object.values.set_f32(DYNAMICOBJECT_RADIUS, radius);
        object.clear_update_mask();
        object
    }

    pub fn corpse(guid: Guid, owner: Guid, position: Position) -> Self {
        let mut object = Self::new(guid, position, KindData::Corpse(CorpseData { owner }));
        object.values.set_guid(CORPSE_FIELD_OWNER, owner);
        object.clear_update_mask();
        object
    }

    // ---- identity ----

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn entry(&self) -> u32 {
        self.values.get_u32(OBJECT_FIELD_ENTRY)
    }

    // ---- fields ----

    pub fn values(&self) -> &ValueFields {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut ValueFields {
        &mut self.values
    }

    pub fn dynamic(&self) -> &DynamicFields {
        &self.dynamic
    }

    pub fn dynamic_mut(&mut self) -> &mut DynamicFields {
        &mut self.dynamic
    }

    pub fn has_changes(&self) -> bool {
        self.values.has_changes() || self.dynamic.has_changes()
    }

    /// Clears the dirty sets once this tick's update blocks are built.
    pub fn clear_update_mask(&mut self) {
        self.values.clear_changes();
        self.dynamic.clear_changes();
    }

    // ---- placement ----

    pub fn position(&self) -> Position {
        self.position
    }

    /// Moves an entity that is not in any map. In-world entities move through
    /// `Map::relocate` so that grid storage follows.
    ///
    /// # Panics
    ///
    /// Panics if the entity is in world.
    pub fn place_at(&mut self, position: Position) {
        assert!(!self.in_world, "{} must be relocated through its map", self.guid);
        self.position = position;
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn phase_mask(&self) -> u32 {
        self.phase_mask
    }

    pub fn set_phase_mask(&mut self, phase_mask: u32) {
        self.phase_mask = phase_mask;
    }

    pub fn is_in_world(&self) -> bool {
        self.in_world
    }

    pub(crate) fn set_in_world(&mut self, in_world: bool) {
        self.in_world = in_world;
    }

    pub fn current_map(&self) -> Option<MapKey> {
        self.map
    }

    pub(crate) fn set_current_map(&mut self, map: Option<MapKey>) {
        self.map = map;
    }

    pub fn grid_slot(&self) -> Option<GridSlot> {
        self.grid_slot
    }

    pub(crate) fn set_grid_slot(&mut self, slot: Option<GridSlot>) {
        self.grid_slot = slot;
    }

    pub fn is_always_active(&self) -> bool {
        self.always_active
    }

    /// Only takes effect when set before the entity enters a map; afterwards the
    /// active set is maintained through `Map::add_to_active`.
    pub fn set_always_active(&mut self, active: bool) {
        self.always_active = active;
    }

    pub fn is_far_visible(&self) -> bool {
        self.far_visible
    }

    pub(crate) fn set_far_visible(&mut self, far_visible: bool) {
        self.far_visible = far_visible;
    }

    /// Container set this entity should live in.
    pub fn wanted_container(&self) -> ContainerType {
        if self.kind == EntityKind::Player || self.far_visible {
            ContainerType::World
        } else {
            ContainerType::Grid
        }
    }

    // ---- relations ----

    pub fn is_player(&self) -> bool {
        self.kind == EntityKind::Player
    }

    pub fn is_game_master(&self) -> bool {
        matches!(&self.data, KindData::Player(player) if player.game_master)
    }

    pub fn owner_guid(&self) -> Option<Guid> {
        let owner = match &self.data {
            KindData::Creature(_) | KindData::Player(_) => self.values.get_guid(UNIT_FIELD_SUMMONED_BY),
            KindData::GameObject(_) => self.values.get_guid(GAMEOBJECT_FIELD_CREATED_BY),
            KindData::DynamicObject(data) => data.caster,
            KindData::Corpse(data) => data.owner,
        };
        (!owner.is_empty()).then_some(owner)
    }

    pub fn charmer_guid(&self) -> Option<Guid> {
        if !matches!(self.kind, EntityKind::Creature | EntityKind::Player) {
            return None;
        }
        let charmer = self.values.get_guid(UNIT_FIELD_CHARMED_BY);
        (!charmer.is_empty()).then_some(charmer)
    }

    pub fn player_data(&self) -> Option<&PlayerData> {
        match &self.data {
            KindData::Player(data) => Some(data),
            _ => None,
        }
    }

    pub fn player_data_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.data {
            KindData::Player(data) => Some(data),
            _ => None,
        }
    }

    // ---- spawn and respawn ----

    pub fn spawn_info(&self) -> Option<&SpawnInfo> {
        match &self.data {
            KindData::Creature(data) => data.spawn.as_ref(),
            KindData::GameObject(data) => data.spawn.as_ref(),
            _ => None,
        }
    }

    pub fn spawn_id(&self) -> Option<SpawnId> {
        self.spawn_info().map(|spawn| spawn.spawn_id)
    }

    /// Logical home of a persisted entity, or its current position otherwise.
    pub fn home_position(&self) -> Position {
        self.spawn_info().map_or(self.position, |spawn| spawn.home)
    }

    pub fn is_alive(&self) -> bool {
        match &self.data {
            KindData::Creature(data) => data.death_state == DeathState::Alive,
            KindData::Player(_) => self.values.get_u32(UNIT_FIELD_HEALTH) > 0,
            KindData::GameObject(data) => data.spawned,
            _ => true,
        }
    }

    pub fn set_death_state(&mut self, state: DeathState) {
        let KindData::Creature(data) = &mut self.data else {
            return;
        };
        data.death_state = state;
        let dead = state != DeathState::Alive;
        if dead {
            self.values.update_u32(UNIT_FIELD_HEALTH, 0);
        } else {
            let max = self.values.get_u32(UNIT_FIELD_MAXHEALTH);
            self.values.update_u32(UNIT_FIELD_HEALTH, max);
        }
        if self.values.has_flag(OBJECT_FIELD_DYNAMIC_FLAGS, UNIT_DYNFLAG_DEAD) != dead {
            self.values.apply_flag(OBJECT_FIELD_DYNAMIC_FLAGS, UNIT_DYNFLAG_DEAD, dead);
        }
    }

    // ---- combat ----

    pub fn combat(&self) -> Option<&CombatState> {
        match &self.data {
            KindData::Creature(data) => Some(&data.combat),
            _ => None,
        }
    }

    pub fn is_in_combat(&self) -> bool {
        self.combat().is_some_and(|combat| combat.in_combat)
    }

    /// Adds threat against `target`. Refused while the AI is locked or the
    /// creature is dead.
    pub fn engage(&mut self, target: Guid, threat: f32) -> bool {
        let KindData::Creature(data) = &mut self.data else {
            return false;
        };
        if data.combat.ai_locked || data.death_state != DeathState::Alive {
            return false;
        }
        *data.combat.threat.entry(target).or_insert(0.0) += threat;
        data.combat.evading = false;
        if !data.combat.in_combat {
            data.combat.in_combat = true;
            self.values.set_flag(UNIT_FIELD_FLAGS, UNIT_FLAG_IN_COMBAT);
            self.values.set_guid(UNIT_FIELD_TARGET, target);
        }
        true
    }

    /// Drops combat and threat and resets to an evading state. The AI stays locked
    /// until the next [`tick`](Self::tick) completes the evade.
    pub fn force_evade(&mut self) {
        let KindData::Creature(data) = &mut self.data else {
            return;
        };
        let was_fighting = data.combat.in_combat;
        data.combat.in_combat = false;
        data.combat.threat.clear();
        data.combat.evading = was_fighting;
        data.combat.ai_locked = was_fighting;
        if was_fighting {
            self.values.remove_flag(UNIT_FIELD_FLAGS, UNIT_FLAG_IN_COMBAT);
            self.values.update_guid(UNIT_FIELD_TARGET, Guid::EMPTY);
        }
    }

    // ---- simulation ----

    /// Advances per-entity timers. Returns `true` when the entity has expired and
    /// must be removed.
    pub(crate) fn tick(&mut self, diff_ms: u64) -> bool {
        match &mut self.data {
            KindData::DynamicObject(data) => match data.remaining_ms.as_mut() {
                Some(remaining) => {
                    *remaining = remaining.saturating_sub(diff_ms);
                    *remaining == 0
                }
                None => false,
            },
            KindData::Creature(data) => {
                if data.combat.ai_locked {
                    data.combat.ai_locked = false;
                    data.combat.evading = false;
                }
                false
            }
            _ => false,
        }
    }

    /// Detaches this entity's links ahead of deletion.
    pub(crate) fn take_links(&mut self) -> ObjectLinks {
        std::mem::take(&mut self.links)
    }
}
