//! Spawn records and the in-memory spawn store.
//!
//! Records are what a database row would hold: enough to instantiate an entity in
//! its home cell. The store indexes them by `(map, difficulty, cell)` so the grid
//! loader can ask for exactly one cell at a time.

use crate::error::PersistenceError;
use crate::grid::{compute_cell_coord, is_valid_map_coord, CellCoord, GridCoord};
use crate::object::layout::{GAMEOBJECT_DISPLAYID, UNIT_FIELD_DISPLAYID, UNIT_FIELD_HEALTH, UNIT_FIELD_LEVEL, UNIT_FIELD_MAXHEALTH};
use crate::object::{SpawnInfo, WorldObject};
use crate::services::SpawnStore;
use crate::types::{Difficulty, Guid, MapId, MapKey, Position, SpawnId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

fn default_level() -> u32 {
    1
}

fn default_health() -> u32 {
    100
}

fn default_respawn_delay() -> u32 {
    300
}

/// Persisted creature spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureSpawn {
    pub spawn_id: SpawnId,
    pub map_id: MapId,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub entry: u32,
    pub position: Position,
    #[serde(default = "default_respawn_delay")]
    pub respawn_delay_secs: u32,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default = "default_health")]
    pub health: u32,
    #[serde(default)]
    pub display_id: u32,
    #[serde(default)]
    pub always_active: bool,
}

impl CreatureSpawn {
    /// Builds the runtime entity for this spawn.
    pub fn create_object(&self, guid: Guid) -> WorldObject {
        let spawn = SpawnInfo {
            spawn_id: self.spawn_id,
            home: self.position,
            respawn_delay_secs: self.respawn_delay_secs,
        };
        let mut object = WorldObject::creature(guid, self.position, Some(spawn));
        let values = object.values_mut();
        values.set_u32(UNIT_FIELD_LEVEL, self.level);
        values.set_u32(UNIT_FIELD_HEALTH, self.health);
        values.set_u32(UNIT_FIELD_MAXHEALTH, self.health);
        values.set_u32(UNIT_FIELD_DISPLAYID, self.display_id);
        object.set_always_active(self.always_active);
        object.clear_update_mask();
        object
    }
}

/// Persisted game object spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObjectSpawn {
    pub spawn_id: SpawnId,
    pub map_id: MapId,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub entry: u32,
    pub position: Position,
    #[serde(default = "default_respawn_delay")]
    pub respawn_delay_secs: u32,
    #[serde(default)]
    pub display_id: u32,
}

impl GameObjectSpawn {
    pub fn create_object(&self, guid: Guid) -> WorldObject {
        let spawn = SpawnInfo {
            spawn_id: self.spawn_id,
            home: self.position,
            respawn_delay_secs: self.respawn_delay_secs,
        };
        let mut object = WorldObject::game_object(guid, self.position, Some(spawn));
        object.values_mut().set_u32(GAMEOBJECT_DISPLAYID, self.display_id);
        object.clear_update_mask();
        object
    }
}

/// Persisted player corpse. Corpses are not split by difficulty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpseRecord {
    pub owner: Guid,
    pub map_id: MapId,
    pub position: Position,
}

/// Which respawn table an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RespawnKind {
    Creature,
    GameObject,
}

/// On-disk spawn data file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpawnData {
    #[serde(default)]
    pub creatures: Vec<CreatureSpawn>,
    #[serde(default)]
    pub game_objects: Vec<GameObjectSpawn>,
    #[serde(default)]
    pub corpses: Vec<CorpseRecord>,
}

type CellKey = (MapId, Difficulty, u32);

/// Spawn store kept entirely in memory, safe to share across map workers.
#[derive(Debug, Default)]
pub struct InMemorySpawnStore {
    creatures: DashMap<SpawnId, CreatureSpawn>,
    game_objects: DashMap<SpawnId, GameObjectSpawn>,
    creature_cells: DashMap<CellKey, Vec<SpawnId>>,
    game_object_cells: DashMap<CellKey, Vec<SpawnId>>,
    corpses: DashMap<(MapId, u32), Vec<CorpseRecord>>,
    respawn_times: DashMap<(MapKey, RespawnKind, SpawnId), u64>,
    broken: DashMap<SpawnId, String>,
}

impl InMemorySpawnStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: SpawnData) -> Self {
        let store = Self::new();
        for creature in data.creatures {
            store.add_creature(creature);
        }
        for game_object in data.game_objects {
            store.add_game_object(game_object);
        }
        for corpse in data.corpses {
            store.add_corpse(corpse);
        }
        store
    }

    /// Loads a JSON spawn file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let data: SpawnData = serde_json::from_str(&content)?;
        info!(
            "📦 Loaded spawn data from {}: {} creatures, {} game objects, {} corpses",
            path.display(),
            data.creatures.len(),
            data.game_objects.len(),
            data.corpses.len()
        );
        Ok(Self::from_data(data))
    }

    fn cell_key(map_id: MapId, difficulty: Difficulty, position: &Position) -> CellKey {
        (map_id, difficulty, compute_cell_coord(position.x, position.y).id())
    }

    pub fn add_creature(&self, spawn: CreatureSpawn) {
        let key = Self::cell_key(spawn.map_id, spawn.difficulty, &spawn.position);
        self.creature_cells.entry(key).or_default().push(spawn.spawn_id);
        self.creatures.insert(spawn.spawn_id, spawn);
    }

    pub fn add_game_object(&self, spawn: GameObjectSpawn) {
        let key = Self::cell_key(spawn.map_id, spawn.difficulty, &spawn.position);
        self.game_object_cells.entry(key).or_default().push(spawn.spawn_id);
        self.game_objects.insert(spawn.spawn_id, spawn);
    }

    pub fn add_corpse(&self, corpse: CorpseRecord) {
        let cell = compute_cell_coord(corpse.position.x, corpse.position.y).id();
        self.corpses.entry((corpse.map_id, cell)).or_default().push(corpse);
    }

    /// Makes later loads of `spawn_id` fail as a corrupt record.
    pub fn mark_broken(&self, spawn_id: SpawnId, reason: impl Into<String>) {
        self.broken.insert(spawn_id, reason.into());
    }

    pub fn creature_count(&self) -> usize {
        self.creatures.len()
    }

    pub fn game_object_count(&self) -> usize {
        self.game_objects.len()
    }

    fn check_broken(&self, spawn_id: SpawnId) -> Result<(), PersistenceError> {
        match self.broken.get(&spawn_id) {
            Some(reason) => Err(PersistenceError::Corrupt {
                spawn_id,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn check_placement(spawn_id: SpawnId, expected: MapId, found: MapId, position: &Position) -> Result<(), PersistenceError> {
        if found != expected {
            return Err(PersistenceError::WrongMap { spawn_id, expected, found });
        }
        if !is_valid_map_coord(position.x, position.y) {
            return Err(PersistenceError::Corrupt {
                spawn_id,
                reason: format!("position ({}, {}) is outside the map", position.x, position.y),
            });
        }
        Ok(())
    }
}

impl SpawnStore for InMemorySpawnStore {
    fn creature_spawns(&self, map_id: MapId, difficulty: Difficulty, cell: CellCoord) -> Vec<SpawnId> {
        self.creature_cells
            .get(&(map_id, difficulty, cell.id()))
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    fn game_object_spawns(&self, map_id: MapId, difficulty: Difficulty, cell: CellCoord) -> Vec<SpawnId> {
        self.game_object_cells
            .get(&(map_id, difficulty, cell.id()))
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    fn populated_grids(&self, map_id: MapId, difficulty: Difficulty) -> Vec<GridCoord> {
        let spawn_cells = self
            .creature_cells
            .iter()
            .chain(self.game_object_cells.iter())
            .filter(|entry| entry.key().0 == map_id && entry.key().1 == difficulty)
            .map(|entry| entry.key().2)
            .collect::<Vec<_>>();
        let corpse_cells = self
            .corpses
            .iter()
            .filter(|entry| entry.key().0 == map_id)
            .map(|entry| entry.key().1)
            .collect::<Vec<_>>();
        let mut grids: Vec<GridCoord> = spawn_cells
            .into_iter()
            .chain(corpse_cells)
            .map(|id| CellCoord::from_id(id).grid())
            .collect();
        grids.sort_unstable_by_key(|coord| coord.index());
        grids.dedup();
        grids
    }

    fn corpses(&self, map_id: MapId, cell: CellCoord) -> Vec<CorpseRecord> {
        self.corpses
            .get(&(map_id, cell.id()))
            .map(|corpses| corpses.clone())
            .unwrap_or_default()
    }

    fn load_creature(&self, spawn_id: SpawnId, map_id: MapId) -> Result<CreatureSpawn, PersistenceError> {
        self.check_broken(spawn_id)?;
        let spawn = self
            .creatures
            .get(&spawn_id)
            .map(|spawn| spawn.clone())
            .ok_or(PersistenceError::SpawnNotFound {
                kind: crate::types::EntityKind::Creature,
                spawn_id,
            })?;
        Self::check_placement(spawn_id, map_id, spawn.map_id, &spawn.position)?;
        Ok(spawn)
    }

    fn load_game_object(&self, spawn_id: SpawnId, map_id: MapId) -> Result<GameObjectSpawn, PersistenceError> {
        self.check_broken(spawn_id)?;
        let spawn = self
            .game_objects
            .get(&spawn_id)
            .map(|spawn| spawn.clone())
            .ok_or(PersistenceError::SpawnNotFound {
                kind: crate::types::EntityKind::GameObject,
                spawn_id,
            })?;
        Self::check_placement(spawn_id, map_id, spawn.map_id, &spawn.position)?;
        Ok(spawn)
    }

    fn respawn_times(&self, map: MapKey) -> Vec<(RespawnKind, SpawnId, u64)> {
        self.respawn_times
            .iter()
            .filter(|entry| entry.key().0 == map)
            .map(|entry| {
                let (_, kind, spawn_id) = *entry.key();
                (kind, spawn_id, *entry.value())
            })
            .collect()
    }

    fn save_respawn_time(&self, map: MapKey, kind: RespawnKind, spawn_id: SpawnId, respawn_at: u64) {
        debug!("💾 Saving {:?} respawn time for spawn {} on {}: {}", kind, spawn_id, map, respawn_at);
        self.respawn_times.insert((map, kind, spawn_id), respawn_at);
    }

    fn remove_respawn_time(&self, map: MapKey, kind: RespawnKind, spawn_id: SpawnId) {
        self.respawn_times.remove(&(map, kind, spawn_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn creature(spawn_id: SpawnId, x: f32, y: f32) -> CreatureSpawn {
        CreatureSpawn {
            spawn_id,
            map_id: 0,
            difficulty: 0,
            entry: 100,
            position: Position::new(x, y, 0.0),
            respawn_delay_secs: 60,
            level: 10,
            health: 500,
            display_id: 7,
            always_active: false,
        }
    }

    #[test]
    fn spawns_are_indexed_by_cell() {
        let store = InMemorySpawnStore::new();
        store.add_creature(creature(1, 10.0, 10.0));
        store.add_creature(creature(2, 12.0, 11.0));
        store.add_creature(creature(3, 900.0, 900.0));
        let cell = compute_cell_coord(10.0, 10.0);
        let mut ids = store.creature_spawns(0, 0, cell);
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
        assert!(store.creature_spawns(0, 1, cell).is_empty());
    }

    #[test]
    fn load_rejects_wrong_map_and_broken_records() {
        let store = InMemorySpawnStore::new();
        store.add_creature(creature(1, 10.0, 10.0));
        assert!(matches!(store.load_creature(1, 5), Err(PersistenceError::WrongMap { .. })));
        store.mark_broken(1, "bad template");
        assert!(matches!(store.load_creature(1, 0), Err(PersistenceError::Corrupt { .. })));
        assert!(matches!(store.load_creature(9, 0), Err(PersistenceError::SpawnNotFound { .. })));
    }

    #[test]
    fn created_creature_carries_spawn_fields() {
        let object = creature(1, 10.0, 10.0).create_object(Guid::new(crate::types::HighGuid::Unit, 100, 1));
        assert_eq!(object.spawn_id(), Some(1));
        assert_eq!(object.values().get_u32(UNIT_FIELD_LEVEL), 10);
        assert_eq!(object.values().get_u32(UNIT_FIELD_MAXHEALTH), 500);
        assert!(!object.has_changes());
    }

    #[test]
    fn respawn_times_are_scoped_by_map() {
        let store = InMemorySpawnStore::new();
        let a = MapKey::continent(0);
        let b = MapKey::new(0, 1, 0);
        store.save_respawn_time(a, RespawnKind::Creature, 1, 100);
        store.save_respawn_time(b, RespawnKind::Creature, 1, 200);
        assert_eq!(store.respawn_times(a), vec![(RespawnKind::Creature, 1, 100)]);
        store.remove_respawn_time(a, RespawnKind::Creature, 1);
        assert!(store.respawn_times(a).is_empty());
    }

    #[test]
    fn loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "creatures": [{{ "spawn_id": 4, "map_id": 1, "entry": 9, "position": {{ "x": 1.0, "y": 2.0, "z": 3.0 }} }}] }}"#
        )
        .expect("write spawn file");
        let store = InMemorySpawnStore::from_json_file(file.path()).expect("valid spawn file");
        assert_eq!(store.creature_count(), 1);
        let spawn = store.load_creature(4, 1).expect("spawn loads");
        assert_eq!(spawn.respawn_delay_secs, 300);
        assert_eq!(spawn.level, 1);
    }
}
