//! Respawn times keyed by spawn id.
//!
//! The runtime entity may not exist while its respawn is pending, so the table is
//! keyed by the persisted spawn id, never by guid. Times are unix seconds.

use super::Map;
use crate::error::{WorldError, WorldResult};
use crate::grid::compute_cell_coord;
use crate::object::layout::{GO_DYNFLAG_HIDDEN, OBJECT_FIELD_DYNAMIC_FLAGS};
use crate::object::{DeathState, KindData, WorldObject};
use crate::persistence::{CreatureSpawn, GameObjectSpawn, RespawnKind};
use crate::types::{EntityKind, Guid, Position, SpawnId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A spawn record whose respawn time has passed.
enum DueSpawn {
    Creature(CreatureSpawn),
    GameObject(GameObjectSpawn),
}

impl DueSpawn {
    fn position(&self) -> Position {
        match self {
            DueSpawn::Creature(spawn) => spawn.position,
            DueSpawn::GameObject(spawn) => spawn.position,
        }
    }

    fn entity_kind(&self) -> EntityKind {
        match self {
            DueSpawn::Creature(_) => EntityKind::Creature,
            DueSpawn::GameObject(_) => EntityKind::GameObject,
        }
    }

    fn entry(&self) -> u32 {
        match self {
            DueSpawn::Creature(spawn) => spawn.entry,
            DueSpawn::GameObject(spawn) => spawn.entry,
        }
    }

    fn create_object(&self, guid: Guid) -> WorldObject {
        match self {
            DueSpawn::Creature(spawn) => spawn.create_object(guid),
            DueSpawn::GameObject(spawn) => spawn.create_object(guid),
        }
    }
}

#[derive(Debug, Default)]
pub struct RespawnTable {
    creatures: HashMap<SpawnId, u64>,
    game_objects: HashMap<SpawnId, u64>,
    /// Entries changed since the last flush, for delayed saves.
    dirty: HashSet<(RespawnKind, SpawnId)>,
}

impl RespawnTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: RespawnKind) -> &HashMap<SpawnId, u64> {
        match kind {
            RespawnKind::Creature => &self.creatures,
            RespawnKind::GameObject => &self.game_objects,
        }
    }

    fn table_mut(&mut self, kind: RespawnKind) -> &mut HashMap<SpawnId, u64> {
        match kind {
            RespawnKind::Creature => &mut self.creatures,
            RespawnKind::GameObject => &mut self.game_objects,
        }
    }

    /// Respawn time, or `0` when none is pending.
    pub fn get(&self, kind: RespawnKind, spawn_id: SpawnId) -> u64 {
        self.table(kind).get(&spawn_id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, kind: RespawnKind, spawn_id: SpawnId, respawn_at: u64) {
        self.table_mut(kind).insert(spawn_id, respawn_at);
        self.dirty.insert((kind, spawn_id));
    }

    /// Restores an entry from storage without marking it dirty.
    pub fn restore(&mut self, kind: RespawnKind, spawn_id: SpawnId, respawn_at: u64) {
        self.table_mut(kind).insert(spawn_id, respawn_at);
    }

    /// Drops an entry without marking it dirty.
    pub fn forget(&mut self, kind: RespawnKind, spawn_id: SpawnId) -> Option<u64> {
        self.table_mut(kind).remove(&spawn_id)
    }

    pub fn remove(&mut self, kind: RespawnKind, spawn_id: SpawnId) -> Option<u64> {
        let removed = self.table_mut(kind).remove(&spawn_id);
        if removed.is_some() {
            self.dirty.insert((kind, spawn_id));
        }
        removed
    }

    /// Whether a respawn is pending and not yet due.
    pub fn is_pending(&self, kind: RespawnKind, spawn_id: SpawnId, now: u64) -> bool {
        self.get(kind, spawn_id) > now
    }

    /// Spawn ids whose respawn time has passed, in ascending order.
    pub fn due(&self, kind: RespawnKind, now: u64) -> Vec<SpawnId> {
        let mut due: Vec<SpawnId> = self
            .table(kind)
            .iter()
            .filter(|(_, &respawn_at)| respawn_at <= now)
            .map(|(&spawn_id, _)| spawn_id)
            .collect();
        due.sort_unstable();
        due
    }

    pub fn len(&self) -> usize {
        self.creatures.len() + self.game_objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creatures.is_empty() && self.game_objects.is_empty()
    }

    /// Drains the dirty set. Each entry carries the current time, or `None` if it
    /// was removed.
    pub fn take_dirty(&mut self) -> Vec<(RespawnKind, SpawnId, Option<u64>)> {
        let dirty: Vec<_> = self.dirty.drain().collect();
        dirty
            .into_iter()
            .map(|(kind, spawn_id)| (kind, spawn_id, self.table(kind).get(&spawn_id).copied()))
            .collect()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Snapshot of every entry, sorted, for comparisons in tests and tooling.
    pub fn entries(&self) -> Vec<(RespawnKind, SpawnId, u64)> {
        let mut entries: Vec<_> = self
            .creatures
            .iter()
            .map(|(&id, &at)| (RespawnKind::Creature, id, at))
            .chain(self.game_objects.iter().map(|(&id, &at)| (RespawnKind::GameObject, id, at)))
            .collect();
        entries.sort_unstable_by_key(|&(kind, id, _)| (kind == RespawnKind::GameObject, id));
        entries
    }
}

impl Map {
    pub fn get_creature_respawn_time(&self, spawn_id: SpawnId) -> u64 {
        self.respawns.get(RespawnKind::Creature, spawn_id)
    }

    pub fn save_creature_respawn_time(&mut self, spawn_id: SpawnId, respawn_at: u64) {
        self.store_respawn_time(RespawnKind::Creature, spawn_id, respawn_at);
    }

    pub fn remove_creature_respawn_time(&mut self, spawn_id: SpawnId) {
        self.drop_respawn_time(RespawnKind::Creature, spawn_id);
    }

    pub fn get_game_object_respawn_time(&self, spawn_id: SpawnId) -> u64 {
        self.respawns.get(RespawnKind::GameObject, spawn_id)
    }

    pub fn save_game_object_respawn_time(&mut self, spawn_id: SpawnId, respawn_at: u64) {
        self.store_respawn_time(RespawnKind::GameObject, spawn_id, respawn_at);
    }

    pub fn remove_game_object_respawn_time(&mut self, spawn_id: SpawnId) {
        self.drop_respawn_time(RespawnKind::GameObject, spawn_id);
    }

    pub fn respawn_table(&self) -> &RespawnTable {
        &self.respawns
    }

    /// Records a respawn time, writing through to the store unless saves are delayed.
    pub(crate) fn store_respawn_time(&mut self, kind: RespawnKind, spawn_id: SpawnId, respawn_at: u64) {
        if self.services.config.respawn.save_immediately {
            self.respawns.restore(kind, spawn_id, respawn_at);
            self.services.store.save_respawn_time(self.key, kind, spawn_id, respawn_at);
        } else {
            self.respawns.set(kind, spawn_id, respawn_at);
        }
    }

    pub(crate) fn drop_respawn_time(&mut self, kind: RespawnKind, spawn_id: SpawnId) {
        if self.respawns.get(kind, spawn_id) == 0 {
            return;
        }
        if self.services.config.respawn.save_immediately {
            self.respawns.forget(kind, spawn_id);
            self.services.store.remove_respawn_time(self.key, kind, spawn_id);
        } else {
            self.respawns.remove(kind, spawn_id);
        }
    }

    /// Kills or despawns a persisted entity and schedules its respawn.
    ///
    /// The entity stays resident but invisible until the next drain point removes
    /// it. Returns the respawn time.
    pub fn despawn_for_respawn(&mut self, guid: Guid) -> WorldResult<u64> {
        let object = self.objects.get(&guid).ok_or(WorldError::ObjectNotFound(guid))?;
        let kind = match object.kind() {
            EntityKind::Creature => RespawnKind::Creature,
            EntityKind::GameObject => RespawnKind::GameObject,
            _ => return Err(WorldError::NotRespawnable(guid)),
        };
        let spawn = object.spawn_info().copied().ok_or(WorldError::NotRespawnable(guid))?;
        let respawn_at = self.services.clock.now() + u64::from(spawn.respawn_delay_secs);
        self.store_respawn_time(kind, spawn.spawn_id, respawn_at);

        self.with_object_mut(guid, |object| {
            if let KindData::GameObject(game_object) = &mut object.data {
                game_object.spawned = false;
                object.values_mut().set_flag(OBJECT_FIELD_DYNAMIC_FLAGS, GO_DYNFLAG_HIDDEN);
            } else {
                object.set_death_state(DeathState::Dead);
            }
            object.visibility.despawn_invisible = true;
        })?;
        self.commands.remove(guid);
        debug!("💤 {} despawned on {}, respawn at {}", guid, self.key, respawn_at);
        Ok(respawn_at)
    }

    /// Recreates due spawns whose home grid is loaded. Spawns in unloaded grids
    /// stay due and come back with their grid.
    pub(crate) fn process_respawns(&mut self) {
        if self.respawns.is_empty() {
            return;
        }
        let now = self.services.clock.now();
        for kind in [RespawnKind::Creature, RespawnKind::GameObject] {
            for spawn_id in self.respawns.due(kind, now) {
                self.respawn(kind, spawn_id);
            }
        }
    }

    fn respawn(&mut self, kind: RespawnKind, spawn_id: SpawnId) {
        let present = match kind {
            RespawnKind::Creature => self.creature_by_spawn.contains_key(&spawn_id),
            RespawnKind::GameObject => self.game_object_by_spawn.contains_key(&spawn_id),
        };
        if present {
            return;
        }
        let map_id = self.key.map_id;
        let loaded = match kind {
            RespawnKind::Creature => self.services.store.load_creature(spawn_id, map_id).map(DueSpawn::Creature),
            RespawnKind::GameObject => self.services.store.load_game_object(spawn_id, map_id).map(DueSpawn::GameObject),
        };
        let spawn = match loaded {
            Ok(spawn) => spawn,
            Err(e) => {
                warn!("⚠️ Dropping respawn of spawn {} on {}: {}", spawn_id, self.key, e);
                self.drop_respawn_time(kind, spawn_id);
                self.stats.load_failures += 1;
                return;
            }
        };
        // Guids are only handed out once the home grid can take the object.
        let home = spawn.position();
        if !self.grid_accepts(compute_cell_coord(home.x, home.y).grid()) {
            return;
        }
        let guid = self.generate_guid(spawn.entity_kind(), spawn.entry());
        self.drop_respawn_time(kind, spawn_id);
        let guid = self.attach(spawn.create_object(guid));
        self.stats.respawns += 1;
        debug!("🌱 Respawned spawn {} as {} on {}", spawn_id, guid, self.key);
    }

    /// Writes dirty respawn times to the store.
    pub fn flush_respawn_times(&mut self) {
        let dirty = self.respawns.take_dirty();
        if dirty.is_empty() {
            return;
        }
        for (kind, spawn_id, respawn_at) in &dirty {
            match respawn_at {
                Some(respawn_at) => self.services.store.save_respawn_time(self.key, *kind, *spawn_id, *respawn_at),
                None => self.services.store.remove_respawn_time(self.key, *kind, *spawn_id),
            }
        }
        debug!("💾 Flushed {} respawn times on {}", dirty.len(), self.key);
    }

    pub(crate) fn update_respawn_flush(&mut self, diff_ms: u64) {
        if self.services.config.respawn.save_immediately {
            return;
        }
        self.respawn_flush_timer.update(diff_ms);
        if self.respawn_flush_timer.passed() {
            self.respawn_flush_timer.reset();
            self.flush_respawn_times();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_reads_as_zero() {
        let table = RespawnTable::new();
        assert_eq!(table.get(RespawnKind::Creature, 5), 0);
        assert!(!table.is_pending(RespawnKind::Creature, 5, 0));
    }

    #[test]
    fn due_entries_are_sorted() {
        let mut table = RespawnTable::new();
        table.set(RespawnKind::Creature, 9, 100);
        table.set(RespawnKind::Creature, 3, 50);
        table.set(RespawnKind::Creature, 4, 500);
        table.set(RespawnKind::GameObject, 1, 10);
        assert_eq!(table.due(RespawnKind::Creature, 100), vec![3, 9]);
        assert_eq!(table.due(RespawnKind::GameObject, 100), vec![1]);
    }

    #[test]
    fn dirty_tracking_reports_removals() {
        let mut table = RespawnTable::new();
        table.restore(RespawnKind::Creature, 1, 10);
        assert!(table.take_dirty().is_empty());
        table.remove(RespawnKind::Creature, 1);
        table.set(RespawnKind::GameObject, 2, 20);
        let mut dirty = table.take_dirty();
        dirty.sort_unstable_by_key(|&(_, id, _)| id);
        assert_eq!(
            dirty,
            vec![(RespawnKind::Creature, 1, None), (RespawnKind::GameObject, 2, Some(20))]
        );
    }

    mod map_respawns {
        use crate::config::{presets, WorldConfigBuilder};
        use crate::error::WorldError;
        use crate::map::Map;
        use crate::object::WorldObject;
        use crate::persistence::{CreatureSpawn, InMemorySpawnStore, RespawnKind};
        use crate::services::{Clock, NullPacketSink, SpawnStore, WorldServices};
        use crate::types::{EntityKind, MapKey, Position};
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        struct FixedClock(AtomicU64);

        impl Clock for FixedClock {
            fn now(&self) -> u64 {
                self.0.load(Ordering::SeqCst)
            }
        }

        fn setup(config: crate::config::WorldConfig) -> (Map, Arc<InMemorySpawnStore>, Arc<FixedClock>) {
            let store = Arc::new(InMemorySpawnStore::new());
            store.add_creature(CreatureSpawn {
                spawn_id: 1,
                map_id: 0,
                difficulty: 0,
                entry: 10,
                position: Position::new(10.0, 10.0, 0.0),
                respawn_delay_secs: 30,
                level: 1,
                health: 50,
                display_id: 0,
                always_active: false,
            });
            let clock = Arc::new(FixedClock(AtomicU64::new(1_000)));
            let services = WorldServices::new(store.clone(), Arc::new(NullPacketSink), config).with_clock(clock.clone());
            (Map::new(MapKey::continent(0), services), store, clock)
        }

        #[test]
        fn despawned_creature_comes_back_when_due() {
            let (mut map, store, clock) = setup(presets::testing());
            map.load_grid(10.0, 10.0).expect("valid");
            map.set_grid_unload_lock(10.0, 10.0, true);
            let first = map.creature_by_spawn_id(1).map(WorldObject::guid).expect("spawned");

            assert_eq!(map.despawn_for_respawn(first).expect("respawnable"), 1_030);
            assert!(map.get_object(first).is_some_and(|object| object.visibility.despawn_invisible));
            map.update(100);
            assert!(map.get_object(first).is_none());
            assert_eq!(store.respawn_times(map.key()), vec![(RespawnKind::Creature, 1, 1_030)]);

            clock.0.store(1_030, Ordering::SeqCst);
            map.update(100);
            let second = map.creature_by_spawn_id(1).map(WorldObject::guid).expect("respawned");
            assert_ne!(first, second);
            assert_eq!(map.get_creature_respawn_time(1), 0);
            assert!(store.respawn_times(map.key()).is_empty());
        }

        #[test]
        fn delayed_saves_flush_on_timer() {
            let config = WorldConfigBuilder::new().with_grid_expiry(0, true).with_respawn_saves(false, 500).build();
            let (mut map, store, _clock) = setup(config);
            map.save_creature_respawn_time(7, 5_000);
            assert!(store.respawn_times(map.key()).is_empty());
            map.update(400);
            assert!(store.respawn_times(map.key()).is_empty());
            map.update(100);
            assert_eq!(store.respawn_times(map.key()), vec![(RespawnKind::Creature, 7, 5_000)]);

            map.remove_creature_respawn_time(7);
            map.unload_all();
            assert!(store.respawn_times(map.key()).is_empty());
        }

        #[test]
        fn respawn_times_are_restored_on_creation() {
            let (mut map, store, _clock) = setup(presets::testing());
            map.save_game_object_respawn_time(3, 9_999);
            let services = map.services().clone();
            let restored = Map::new(map.key(), services);
            assert_eq!(restored.get_game_object_respawn_time(3), 9_999);
            assert_eq!(store.respawn_times(map.key()).len(), 1);
        }

        #[test]
        fn due_spawn_in_unloaded_grid_holds_no_guid() {
            let (mut map, _store, _clock) = setup(presets::testing());
            map.save_creature_respawn_time(1, 500);
            let guids = Arc::clone(&map.services().guids);
            let before = guids.peek(EntityKind::Creature);

            for _ in 0..100 {
                map.update(50);
            }
            assert_eq!(guids.peek(EntityKind::Creature), before);
            assert!(map.creature_by_spawn_id(1).is_none());
            assert_eq!(map.get_creature_respawn_time(1), 500);

            map.load_grid(10.0, 10.0).expect("valid");
            map.set_grid_unload_lock(10.0, 10.0, true);
            assert!(map.creature_by_spawn_id(1).is_some());
            assert_eq!(guids.peek(EntityKind::Creature), before + 1);
        }

        #[test]
        fn only_persisted_entities_respawn() {
            let (mut map, _store, _clock) = setup(presets::testing());
            let guid = map.generate_guid(crate::types::EntityKind::Creature, 1);
            map.add_to_map(WorldObject::creature(guid, Position::new(5.0, 5.0, 0.0), None)).expect("added");
            assert!(matches!(map.despawn_for_respawn(guid), Err(WorldError::NotRespawnable(_))));
        }
    }
}
