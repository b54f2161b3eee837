//! # Map Manager
//!
//! Registry of live maps and the worker pool that updates them.
//!
//! Maps never share mutable state, so one tick updates all of them in parallel on
//! a dedicated rayon pool. Each map sits behind its own mutex; cross-map work such
//! as teleports locks one map at a time.

use super::{Map, MapStats, Relocation};
use crate::error::{WorldError, WorldResult};
use crate::services::WorldServices;
use crate::types::{Difficulty, Guid, InstanceId, MapId, MapKey, Position};
use dashmap::DashMap;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Shared handle to one live map.
pub type MapHandle = Arc<Mutex<Map>>;

fn lock(handle: &MapHandle) -> MutexGuard<'_, Map> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Aggregate statistics over every live map.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManagerStats {
    pub maps: usize,
    pub instances: usize,
    pub totals: MapStats,
}

pub struct MapManager {
    services: WorldServices,
    maps: DashMap<MapKey, MapHandle>,
    next_instance_id: AtomicU32,
    pool: ThreadPool,
}

impl MapManager {
    /// Creates a manager and its update pool.
    pub fn new(services: WorldServices) -> WorldResult<Self> {
        let threads = services.config.manager.update_threads;
        let mut builder = ThreadPoolBuilder::new().thread_name(|index| format!("map-worker-{index}"));
        if threads > 0 {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;
        info!("🌍 Map manager started with {} update workers", pool.current_num_threads());
        Ok(Self {
            services,
            maps: DashMap::new(),
            next_instance_id: AtomicU32::new(1),
            pool,
        })
    }

    pub fn services(&self) -> &WorldServices {
        &self.services
    }

    /// Creates the shared copy of a continent.
    pub fn create_map(&self, map_id: MapId) -> WorldResult<MapHandle> {
        self.insert_map(MapKey::continent(map_id))
    }

    /// Returns the continent, creating it on first use.
    pub fn get_or_create_map(&self, map_id: MapId) -> MapHandle {
        let key = MapKey::continent(map_id);
        self.maps
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(Map::new(key, self.services.clone()))))
            .clone()
    }

    /// Creates a fresh instanced copy of `map_id`.
    pub fn create_instance(&self, map_id: MapId, difficulty: Difficulty) -> WorldResult<MapHandle> {
        let limit = self.services.config.manager.max_instances;
        if self.instance_count() >= limit {
            warn!("🚧 Refusing instance of map {}: limit of {} reached", map_id, limit);
            return Err(WorldError::InstanceLimitReached(limit));
        }
        let instance_id: InstanceId = self.next_instance_id.fetch_add(1, Ordering::Relaxed);
        self.insert_map(MapKey::new(map_id, instance_id, difficulty))
    }

    fn insert_map(&self, key: MapKey) -> WorldResult<MapHandle> {
        match self.maps.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(WorldError::MapAlreadyExists(key)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let handle = Arc::new(Mutex::new(Map::new(key, self.services.clone())));
                slot.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    pub fn get_map(&self, key: MapKey) -> Option<MapHandle> {
        self.maps.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Runs `f` with exclusive access to one map.
    pub fn with_map<R>(&self, key: MapKey, f: impl FnOnce(&mut Map) -> R) -> WorldResult<R> {
        let handle = self.get_map(key).ok_or(WorldError::MapNotFound(key))?;
        let mut map = lock(&handle);
        Ok(f(&mut map))
    }

    /// Unloads and forgets a map.
    pub fn destroy_map(&self, key: MapKey) -> WorldResult<()> {
        let (_, handle) = self.maps.remove(&key).ok_or(WorldError::MapNotFound(key))?;
        lock(&handle).unload_all();
        info!("💥 Destroyed {}", key);
        Ok(())
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    pub fn instance_count(&self) -> usize {
        self.maps.iter().filter(|entry| entry.key().instance_id != 0).count()
    }

    pub fn keys(&self) -> Vec<MapKey> {
        let mut keys: Vec<MapKey> = self.maps.iter().map(|entry| *entry.key()).collect();
        keys.sort_unstable();
        keys
    }

    /// Updates every map once, in parallel.
    pub fn update(&self, diff_ms: u64) {
        let handles: Vec<MapHandle> = self.maps.iter().map(|entry| Arc::clone(entry.value())).collect();
        self.pool.install(|| {
            handles.par_iter().for_each(|handle| lock(handle).update(diff_ms));
        });
    }

    /// Moves an entity to `position` on map `to`.
    ///
    /// Within one map this is a relocation. Across maps the entity is removed from
    /// the source with its links intact and inserted into the target; if the target
    /// refuses it, the entity goes back where it came from.
    pub fn teleport(&self, guid: Guid, from: MapKey, to: MapKey, position: Position) -> WorldResult<()> {
        let source = self.get_map(from).ok_or(WorldError::MapNotFound(from))?;
        if from == to {
            let outcome = lock(&source).relocate(guid, position)?;
            if outcome != Relocation::Moved {
                debug!("🧭 Teleport of {} within {} ended as {:?}", guid, from, outcome);
            }
            return Ok(());
        }
        let target = self.get_map(to).ok_or(WorldError::MapNotFound(to))?;

        let mut object = lock(&source).remove_from_map(guid, false)?;
        let origin = object.position();
        object.place_at(position);
        let fallback = object.clone();

        let result = lock(&target).add_to_map(object);
        match result {
            Ok(_) => {
                debug!("🌀 Teleported {} from {} to {}", guid, from, to);
                Ok(())
            }
            Err(e) => {
                let mut object = fallback;
                object.place_at(origin);
                if let Err(restore) = lock(&source).add_to_map(object) {
                    warn!("⚠️ Could not return {} to {} after failed teleport: {}", guid, from, restore);
                }
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> ManagerStats {
        let handles: Vec<(MapKey, MapHandle)> =
            self.maps.iter().map(|entry| (*entry.key(), Arc::clone(entry.value()))).collect();
        let mut stats = ManagerStats::default();
        for (key, handle) in handles {
            stats.maps += 1;
            if key.instance_id != 0 {
                stats.instances += 1;
            }
            stats.totals.merge(&lock(&handle).stats());
        }
        stats
    }

    /// Unloads every map.
    pub fn shutdown(&self) {
        let keys = self.keys();
        for key in &keys {
            if let Some((_, handle)) = self.maps.remove(key) {
                lock(&handle).unload_all();
            }
        }
        info!("🛑 Map manager shut down ({} maps unloaded)", keys.len());
    }
}

impl std::fmt::Debug for MapManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapManager")
            .field("maps", &self.maps.len())
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::presets;
    use crate::object::WorldObject;
    use crate::persistence::InMemorySpawnStore;
    use crate::services::NullPacketSink;
    use crate::types::EntityKind;

    fn manager() -> MapManager {
        let services = WorldServices::new(
            Arc::new(InMemorySpawnStore::new()),
            Arc::new(NullPacketSink),
            presets::testing(),
        );
        MapManager::new(services).expect("pool builds")
    }

    #[test]
    fn continents_are_unique() {
        let manager = manager();
        manager.create_map(0).expect("created");
        assert!(matches!(manager.create_map(0), Err(WorldError::MapAlreadyExists(_))));
        let again = manager.get_or_create_map(0);
        assert!(Arc::ptr_eq(&again, &manager.get_map(MapKey::continent(0)).expect("present")));
    }

    #[test]
    fn instances_get_fresh_ids_and_respect_limit() {
        let manager = manager();
        let first = manager.create_instance(33, 1).expect("created");
        let second = manager.create_instance(33, 1).expect("created");
        assert_ne!(lock(&first).key(), lock(&second).key());
        for _ in 2..16 {
            manager.create_instance(33, 0).expect("under limit");
        }
        assert!(matches!(manager.create_instance(33, 0), Err(WorldError::InstanceLimitReached(16))));
        assert_eq!(manager.instance_count(), 16);
    }

    #[test]
    fn update_ticks_every_map() {
        let manager = manager();
        manager.create_map(0).expect("created");
        manager.create_map(1).expect("created");
        manager.update(50);
        manager.update(50);
        let stats = manager.stats();
        assert_eq!(stats.maps, 2);
        assert_eq!(stats.totals.ticks, 4);
    }

    #[test]
    fn teleport_moves_between_maps() {
        let manager = manager();
        let from = MapKey::continent(0);
        let to = MapKey::continent(1);
        manager.create_map(0).expect("created");
        manager.create_map(1).expect("created");
        let guid = manager.services().guids.next(EntityKind::Player, 0);
        manager
            .with_map(from, |map| map.add_to_map(WorldObject::player(guid, "Ana", Position::new(1.0, 1.0, 0.0))))
            .expect("map exists")
            .expect("added");

        manager.teleport(guid, from, to, Position::new(50.0, 50.0, 0.0)).expect("teleported");
        assert!(!manager.with_map(from, |map| map.contains(guid)).expect("map exists"));
        let position = manager
            .with_map(to, |map| map.get_player(guid).map(WorldObject::position))
            .expect("map exists");
        assert_eq!(position, Some(Position::new(50.0, 50.0, 0.0)));
    }

    #[test]
    fn failed_teleport_returns_entity() {
        let manager = manager();
        let from = MapKey::continent(0);
        let to = MapKey::continent(1);
        manager.create_map(0).expect("created");
        manager.create_map(1).expect("created");
        let guid = manager.services().guids.next(EntityKind::Creature, 1);
        manager
            .with_map(from, |map| map.add_to_map(WorldObject::creature(guid, Position::new(1.0, 1.0, 0.0), None)))
            .expect("map exists")
            .expect("added");

        let result = manager.teleport(guid, from, to, Position::new(1.0e7, 0.0, 0.0));
        assert!(matches!(result, Err(WorldError::InvalidCoordinates { .. })));
        assert!(manager.with_map(from, |map| map.contains(guid)).expect("map exists"));
    }

    #[test]
    fn destroy_and_shutdown_forget_maps() {
        let manager = manager();
        manager.create_map(0).expect("created");
        manager.create_instance(1, 0).expect("created");
        manager.destroy_map(MapKey::continent(0)).expect("present");
        assert!(matches!(manager.destroy_map(MapKey::continent(0)), Err(WorldError::MapNotFound(_))));
        manager.shutdown();
        assert_eq!(manager.map_count(), 0);
    }
}
