//! Grid load and unload.
//!
//! Loading walks every cell of a new grid and instantiates its persisted spawns and
//! corpses. Unloading runs four passes in a fixed order:
//!
//! 1. **Evacuate** - persisted creatures standing outside their home grid go home
//! 2. **Stop** - combat is dropped and area effects owned by residents are removed
//! 3. **Clean** - links between residents and other entities are severed
//! 4. **Unload** - residents leave the map; corpses are kept for the next load
//!
//! Evacuation is skipped when the whole map is being torn down.

use super::Map;
use crate::grid::{compute_cell_coord, ContainerType, Grid, GridCoord, GridState};
use crate::object::{DeathState, KindData, WorldObject};
use crate::persistence::{CorpseRecord, RespawnKind};
use crate::types::{EntityKind, Guid};
use tracing::{debug, info, warn};

impl Map {
    /// Loads `coord` if it is absent. A grid scheduled for removal is revived
    /// instead. Returns `true` when a new grid was created.
    pub(crate) fn ensure_grid_loaded(&mut self, coord: GridCoord) -> bool {
        if let Some(grid) = self.grids.get_mut(coord) {
            if grid.state() == GridState::Removal {
                grid.set_state(GridState::Idle);
                grid.info_mut().reset_timer();
                debug!("♻️ Grid {} on {} revived before unloading", coord, self.key);
            }
            return false;
        }

        let expiry_ms = self.services.config.grid.grid_expiry_ms;
        let grid = self.grids.insert(Grid::new(coord, expiry_ms, false));
        grid.set_state(GridState::Loading);

        let loaded = self.load_grid_objects(coord);
        if let Some(grid) = self.grids.get_mut(coord) {
            grid.set_state(GridState::Active);
        }
        self.stats.grids_loaded += 1;
        self.stats.objects_loaded += loaded as u64;
        debug!("🧱 Loaded grid {} on {} with {} objects", coord, self.key, loaded);
        true
    }

    pub(crate) fn preload_all_grids(&mut self) {
        let grids = self.services.store.populated_grids(self.key.map_id, self.key.difficulty);
        for coord in &grids {
            self.ensure_grid_loaded(*coord);
            if let Some(grid) = self.grids.get_mut(*coord) {
                grid.info_mut().set_unload_lock(true);
            }
        }
        info!("📚 Preloaded {} grids on {}", grids.len(), self.key);
    }

    /// Instantiates the persisted contents of every cell of `coord`.
    fn load_grid_objects(&mut self, coord: GridCoord) -> usize {
        let store = std::sync::Arc::clone(&self.services.store);
        let map_id = self.key.map_id;
        let difficulty = self.key.difficulty;
        let now = self.services.clock.now();
        let mut loaded = 0;

        for cell in coord.cells() {
            for spawn_id in store.creature_spawns(map_id, difficulty, cell) {
                if self.creature_by_spawn.contains_key(&spawn_id)
                    || self.respawns.is_pending(RespawnKind::Creature, spawn_id, now)
                {
                    continue;
                }
                match store.load_creature(spawn_id, map_id) {
                    Ok(spawn) => {
                        self.drop_respawn_time(RespawnKind::Creature, spawn_id);
                        let guid = self.generate_guid(EntityKind::Creature, spawn.entry);
                        self.attach(spawn.create_object(guid));
                        loaded += 1;
                    }
                    Err(e) => {
                        warn!("⚠️ Skipping creature spawn {} on {}: {}", spawn_id, self.key, e);
                        self.stats.load_failures += 1;
                    }
                }
            }

            for spawn_id in store.game_object_spawns(map_id, difficulty, cell) {
                if self.game_object_by_spawn.contains_key(&spawn_id)
                    || self.respawns.is_pending(RespawnKind::GameObject, spawn_id, now)
                {
                    continue;
                }
                match store.load_game_object(spawn_id, map_id) {
                    Ok(spawn) => {
                        self.drop_respawn_time(RespawnKind::GameObject, spawn_id);
                        let guid = self.generate_guid(EntityKind::GameObject, spawn.entry);
                        self.attach(spawn.create_object(guid));
                        loaded += 1;
                    }
                    Err(e) => {
                        warn!("⚠️ Skipping game object spawn {} on {}: {}", spawn_id, self.key, e);
                        self.stats.load_failures += 1;
                    }
                }
            }

            for record in store.corpses(map_id, cell) {
                if self.load_corpse(record) {
                    loaded += 1;
                }
            }
        }
        loaded
    }

    /// Places a stored corpse. Loading the same corpse twice leaves a single entity.
    fn load_corpse(&mut self, record: CorpseRecord) -> bool {
        if let Some(guid) = self.corpses_by_owner.get(&record.owner).copied() {
            if let Some(corpse) = self.objects.get_mut(&guid) {
                corpse.set_in_world(true);
                return false;
            }
            if let Some(corpse) = self.detached_corpses.remove(&guid) {
                self.attach(corpse);
                return true;
            }
        }
        let guid = self.generate_guid(EntityKind::Corpse, 0);
        self.attach(WorldObject::corpse(guid, record.owner, record.position));
        true
    }

    /// Whether a player or always-active entity keeps `coord` alive.
    fn has_activator_near(&self, coord: GridCoord) -> bool {
        let range = self.services.config.grid.activation_range;
        self.players
            .iter()
            .chain(self.active.iter())
            .filter_map(|guid| self.objects.get(guid))
            .any(|object| {
                let position = object.position();
                coord.distance_to(position.x, position.y) <= range
            })
    }

    /// Unloads one grid.
    ///
    /// Without `unload_all` the grid is kept when an activator is in range and its
    /// creatures are evacuated first. Returns whether the grid was unloaded.
    pub fn unload_grid(&mut self, coord: GridCoord, unload_all: bool) -> bool {
        if !self.grids.contains(coord) {
            return false;
        }
        if !unload_all {
            if self.has_activator_near(coord) {
                debug!("⏸️ Grid {} on {} still has an activator in range", coord, self.key);
                return false;
            }
            self.evacuate_grid(coord);
        }
        if let Some(grid) = self.grids.get_mut(coord) {
            grid.set_state(GridState::Unloading);
        }

        self.stop_grid(coord);
        self.clean_grid(coord);
        let unloaded = self.unload_grid_objects(coord);

        self.grids.remove(coord);
        self.stats.grids_unloaded += 1;
        self.stats.objects_unloaded += unloaded as u64;
        debug!("🧹 Unloaded grid {} on {} ({} objects)", coord, self.key, unloaded);
        true
    }

    /// Tears down every grid and flushes pending respawn times.
    pub fn unload_all(&mut self) {
        let coords = self.grids.coords();
        let count = coords.len();
        for coord in coords {
            self.unload_grid(coord, true);
        }
        let dropped = self.commands.take_additions().len();
        while self.commands.pop_removal().is_some() {}
        self.commands.take_switches();
        self.detached_corpses.clear();
        self.flush_respawn_times();
        info!("🗑️ Unloaded {} grids on {} ({} queued additions dropped)", count, self.key, dropped);
    }

    /// Sends persisted creatures standing in `coord` back to their home grid.
    fn evacuate_grid(&mut self, coord: GridCoord) {
        for cell in coord.cells() {
            for container in [ContainerType::Grid, ContainerType::World] {
                let mut index = 0;
                loop {
                    let Some(grid) = self.grids.get(coord) else {
                        return;
                    };
                    let slots = grid.cell(cell).container(container, EntityKind::Creature);
                    let Some(guid) = slots.get(index) else {
                        break;
                    };
                    let before = slots.len();
                    let moved = self.evacuate_creature(guid, coord);
                    let after = self
                        .grids
                        .get(coord)
                        .map_or(0, |grid| grid.cell(cell).container(container, EntityKind::Creature).len());
                    // A shrunken container moved another entry into this slot.
                    if !moved || after >= before {
                        index += 1;
                    }
                }
            }
        }
    }

    fn evacuate_creature(&mut self, guid: Guid, coord: GridCoord) -> bool {
        let Some(home) = self.objects.get(&guid).and_then(|object| object.spawn_info()).map(|spawn| spawn.home) else {
            return false;
        };
        let home_cell = compute_cell_coord(home.x, home.y);
        if home_cell.grid() == coord {
            return false;
        }
        self.ensure_grid_loaded(home_cell.grid());
        self.move_between_cells(guid, home_cell, home);
        self.stats.evacuations += 1;
        true
    }

    /// Drops combat on every resident and removes area effects they own.
    fn stop_grid(&mut self, coord: GridCoord) {
        let Some(grid) = self.grids.get(coord) else {
            return;
        };
        let mut effects = Vec::new();
        for guid in grid.all_guids() {
            let Some(object) = self.objects.get_mut(&guid) else {
                continue;
            };
            if object.is_in_combat() {
                object.force_evade();
                if object.has_changes() {
                    self.pending_updates.insert(guid);
                }
            }
            effects.append(&mut object.links.area_effects);
        }
        for effect in effects {
            if self.objects.contains_key(&effect) {
                self.sever_links(effect);
                self.detach(effect);
                self.stats.objects_removed += 1;
            }
        }
    }

    fn clean_grid(&mut self, coord: GridCoord) {
        let Some(grid) = self.grids.get(coord) else {
            return;
        };
        for guid in grid.all_guids() {
            self.sever_links(guid);
        }
    }

    /// Removes `guid`'s links and every back-reference other entities hold to it.
    pub(crate) fn sever_links(&mut self, guid: Guid) {
        let Some(links) = self.objects.get_mut(&guid).map(WorldObject::take_links) else {
            return;
        };
        if let Some(summoner) = links.summoner.and_then(|summoner| self.objects.get_mut(&summoner)) {
            summoner.links.summons.retain(|summon| *summon != guid);
        }
        for summon in links.summons {
            if let Some(object) = self.objects.get_mut(&summon) {
                if object.links.summoner == Some(guid) {
                    object.links.summoner = None;
                }
            }
        }
        for caster in links.aura_casters {
            if let Some(object) = self.objects.get_mut(&caster) {
                object.links.aura_targets.retain(|target| *target != guid);
            }
        }
        for target in links.aura_targets {
            if let Some(object) = self.objects.get_mut(&target) {
                object.links.aura_casters.retain(|caster| *caster != guid);
            }
        }
        if let Some(KindData::DynamicObject(effect)) = self.objects.get(&guid).map(|object| &object.data) {
            let caster = effect.caster;
            if let Some(owner) = self.objects.get_mut(&caster) {
                owner.links.area_effects.retain(|effect| *effect != guid);
            }
        }
    }

    /// Empties every container of `coord`, persisting respawn times of dead spawns.
    fn unload_grid_objects(&mut self, coord: GridCoord) -> usize {
        let now = self.services.clock.now();
        let cells: Vec<_> = coord.cells().collect();
        let mut unloaded = 0;
        for cell in cells {
            for container in [ContainerType::Grid, ContainerType::World] {
                for kind in EntityKind::ALL {
                    loop {
                        let Some(guid) = self
                            .grids
                            .get_mut(coord)
                            .and_then(|grid| grid.cell_mut(cell).container_mut(container, kind).pop_front())
                        else {
                            break;
                        };
                        self.persist_unloaded_respawn(guid, now);
                        let Some(object) = self.detach(guid) else {
                            continue;
                        };
                        if kind == EntityKind::Corpse {
                            self.detached_corpses.insert(guid, object);
                        }
                        unloaded += 1;
                    }
                }
            }
        }
        unloaded
    }

    /// Stores a respawn time for a dead spawn that has none yet.
    fn persist_unloaded_respawn(&mut self, guid: Guid, now: u64) {
        let Some(object) = self.objects.get(&guid) else {
            return;
        };
        let Some(spawn) = object.spawn_info().copied() else {
            return;
        };
        let kind = match &object.data {
            KindData::Creature(creature) if creature.death_state != DeathState::Alive => RespawnKind::Creature,
            KindData::GameObject(game_object) if !game_object.spawned => RespawnKind::GameObject,
            _ => return,
        };
        if self.respawns.get(kind, spawn.spawn_id) == 0 {
            self.store_respawn_time(kind, spawn.spawn_id, now + u64::from(spawn.respawn_delay_secs));
        }
    }

    /// Advances grid activity: grids near activators stay active, others idle,
    /// expired idle grids are scheduled for removal and unloaded on the next tick.
    pub(crate) fn update_grids(&mut self, diff_ms: u64) {
        let range = self.services.config.grid.activation_range;
        let activators: Vec<_> = self
            .players
            .iter()
            .chain(self.active.iter())
            .filter_map(|guid| self.objects.get(guid))
            .map(WorldObject::position)
            .collect();

        let mut scheduled = Vec::new();
        for grid in self.grids.iter_mut() {
            let coord = grid.coord();
            let in_range = activators
                .iter()
                .any(|position| coord.distance_to(position.x, position.y) <= range);
            if in_range {
                grid.info_mut().reset_timer();
                grid.set_state(GridState::Active);
                continue;
            }
            match grid.state() {
                GridState::Removal => scheduled.push(coord),
                GridState::Active => {
                    grid.set_state(GridState::Idle);
                    if self.unload_enabled && grid.info_mut().can_unload(diff_ms) {
                        grid.set_state(GridState::Removal);
                    }
                }
                GridState::Idle => {
                    if self.unload_enabled && grid.info_mut().can_unload(diff_ms) {
                        grid.set_state(GridState::Removal);
                    }
                }
                _ => {}
            }
        }

        for coord in scheduled {
            self.unload_grid(coord, false);
        }
    }

    /// Number of grids currently in `state`.
    pub fn grids_in_state(&self, state: GridState) -> usize {
        self.grids.iter().filter(|grid| grid.state() == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{presets, WorldConfigBuilder};
    use crate::grid::compute_grid_coord;
    use crate::persistence::{CreatureSpawn, InMemorySpawnStore};
    use crate::services::{NullPacketSink, SpawnStore, WorldServices};
    use crate::types::{MapKey, Position, SpawnId};
    use std::sync::Arc;

    fn spawn(spawn_id: SpawnId, x: f32, y: f32) -> CreatureSpawn {
        CreatureSpawn {
            spawn_id,
            map_id: 0,
            difficulty: 0,
            entry: 50,
            position: Position::new(x, y, 0.0),
            respawn_delay_secs: 120,
            level: 5,
            health: 80,
            display_id: 11,
            always_active: false,
        }
    }

    fn map_with(store: InMemorySpawnStore) -> Map {
        let services = WorldServices::new(Arc::new(store), Arc::new(NullPacketSink), presets::testing());
        Map::new(MapKey::continent(0), services)
    }

    #[test]
    fn loading_twice_does_not_duplicate_spawns() {
        let store = InMemorySpawnStore::new();
        store.add_creature(spawn(1, 10.0, 10.0));
        store.add_creature(spawn(2, 20.0, 20.0));
        let mut map = map_with(store);
        map.load_grid(10.0, 10.0).expect("valid");
        assert_eq!(map.object_count(), 2);
        map.load_grid(10.0, 10.0).expect("valid");
        assert_eq!(map.object_count(), 2);
        assert!(map.creature_by_spawn_id(1).is_some());
    }

    #[test]
    fn preload_loads_every_populated_grid_on_creation() {
        let store = Arc::new(InMemorySpawnStore::new());
        store.add_creature(spawn(1, 10.0, 10.0));
        store.add_creature(spawn(2, 1000.0, 1000.0));
        store.add_creature(spawn(3, -900.0, 40.0));
        let config = WorldConfigBuilder::new().with_grid_expiry(0, true).with_preload(true).build();
        let services = WorldServices::new(store.clone(), Arc::new(NullPacketSink), config);
        let mut map = Map::new(MapKey::continent(0), services);

        let populated = store.populated_grids(0, 0);
        assert_eq!(populated.len(), 3);
        assert_eq!(map.loaded_grids().len(), populated.len());
        for coord in &populated {
            assert_eq!(map.grid_state(*coord), Some(GridState::Active));
        }
        for spawn_id in 1..=3 {
            assert!(map.creature_by_spawn_id(spawn_id).is_some());
        }

        map.update(100);
        map.update(100);
        assert_eq!(map.loaded_grids().len(), 3);
        assert_eq!(map.object_count(), 3);
    }

    #[test]
    fn broken_records_are_skipped() {
        let store = InMemorySpawnStore::new();
        store.add_creature(spawn(1, 10.0, 10.0));
        store.add_creature(spawn(2, 20.0, 20.0));
        store.mark_broken(2, "bad template");
        let mut map = map_with(store);
        map.load_grid(10.0, 10.0).expect("valid");
        assert_eq!(map.object_count(), 1);
        assert_eq!(map.stats().load_failures, 1);
    }

    #[test]
    fn unload_and_reload_restore_spawns() {
        let store = InMemorySpawnStore::new();
        store.add_creature(spawn(1, 10.0, 10.0));
        let mut map = map_with(store);
        map.load_grid(10.0, 10.0).expect("valid");
        let coord = compute_grid_coord(10.0, 10.0);
        let first = map.creature_by_spawn_id(1).map(WorldObject::guid).expect("spawned");

        assert!(map.unload_grid(coord, false));
        assert_eq!(map.object_count(), 0);
        assert!(!map.is_grid_loaded(10.0, 10.0));

        map.load_grid(10.0, 10.0).expect("valid");
        let second = map.creature_by_spawn_id(1).map(WorldObject::guid).expect("respawned");
        assert_ne!(first, second);
        assert_eq!(map.object_count(), 1);
    }

    #[test]
    fn activator_blocks_unforced_unload() {
        let mut map = map_with(InMemorySpawnStore::new());
        let player = WorldObject::player(map.generate_guid(EntityKind::Player, 0), "Ana", Position::new(1.0, 1.0, 0.0));
        map.add_to_map(player).expect("added");
        let coord = compute_grid_coord(1.0, 1.0);
        assert!(!map.unload_grid(coord, false));
        assert!(map.unload_grid(coord, true));
        assert_eq!(map.player_count(), 0);
    }

    #[test]
    fn evacuation_sends_wanderers_home() {
        let store = InMemorySpawnStore::new();
        store.add_creature(spawn(1, 10.0, 10.0));
        let mut map = map_with(store);
        map.load_grid(10.0, 10.0).expect("valid");
        let guid = map.creature_by_spawn_id(1).map(WorldObject::guid).expect("spawned");

        let away = Position::new(600.0, 10.0, 0.0);
        map.load_grid(away.x, away.y).expect("valid");
        map.relocate(guid, away).expect("resident");
        let away_grid = compute_grid_coord(away.x, away.y);
        assert_ne!(away_grid, compute_grid_coord(10.0, 10.0));

        assert!(map.unload_grid(away_grid, false));
        let object = map.get_creature(guid).expect("evacuated, not unloaded");
        assert_eq!(object.position(), Position::new(10.0, 10.0, 0.0));
        assert_eq!(map.stats().evacuations, 1);
    }

    #[test]
    fn dead_spawns_store_respawn_time_on_unload() {
        let store = Arc::new(InMemorySpawnStore::new());
        store.add_creature(spawn(1, 10.0, 10.0));
        let services = WorldServices::new(store.clone(), Arc::new(NullPacketSink), presets::testing());
        let mut map = Map::new(MapKey::continent(0), services);
        map.load_grid(10.0, 10.0).expect("valid");
        let guid = map.creature_by_spawn_id(1).map(WorldObject::guid).expect("spawned");
        map.with_object_mut(guid, |object| object.set_death_state(DeathState::Dead)).expect("resident");

        map.unload_grid(compute_grid_coord(10.0, 10.0), false);
        assert!(map.get_creature_respawn_time(1) > 0);
        assert_eq!(store.respawn_times(map.key()).len(), 1);

        map.load_grid(10.0, 10.0).expect("valid");
        assert!(map.creature_by_spawn_id(1).is_none());
    }

    #[test]
    fn corpses_survive_unload_as_one_entity() {
        let store = InMemorySpawnStore::new();
        let owner = crate::types::Guid::new(crate::types::HighGuid::Player, 0, 99);
        store.add_corpse(CorpseRecord { owner, map_id: 0, position: Position::new(10.0, 10.0, 0.0) });
        let mut map = map_with(store);
        map.load_grid(10.0, 10.0).expect("valid");
        let corpse = map.corpse_by_owner(owner).map(WorldObject::guid).expect("corpse loaded");

        map.unload_grid(compute_grid_coord(10.0, 10.0), false);
        assert!(map.corpse_by_owner(owner).is_none());
        assert_eq!(map.stats().detached_corpses, 1);

        map.load_grid(10.0, 10.0).expect("valid");
        map.load_grid(10.0, 10.0).expect("valid");
        assert_eq!(map.corpse_by_owner(owner).map(WorldObject::guid), Some(corpse));
        assert_eq!(map.object_count(), 1);
    }

    #[test]
    fn stop_removes_area_effects_of_residents() {
        let mut map = map_with(InMemorySpawnStore::new());
        let caster = map.generate_guid(EntityKind::Creature, 1);
        map.add_to_map(WorldObject::creature(caster, Position::new(10.0, 10.0, 0.0), None)).expect("added");
        let effect_position = Position::new(700.0, 10.0, 0.0);
        let effect = map.spawn_area_effect(caster, 100, 5.0, None, effect_position).expect("spawned");
        assert!(map.get_dynamic_object(effect).is_some());

        map.unload_grid(compute_grid_coord(10.0, 10.0), false);
        assert!(map.get_dynamic_object(effect).is_none());
        assert!(map.is_grid_loaded(effect_position.x, effect_position.y));
    }

    #[test]
    fn idle_grids_unload_after_expiry() {
        let mut map = map_with(InMemorySpawnStore::new());
        map.load_grid(10.0, 10.0).expect("valid");
        map.update(100);
        assert!(map.is_removal_grid(10.0, 10.0));
        map.update(100);
        assert!(!map.is_grid_loaded(10.0, 10.0));
        assert_eq!(map.stats().grids_unloaded, 1);
    }

    #[test]
    fn unload_lock_pins_grid() {
        let mut map = map_with(InMemorySpawnStore::new());
        map.load_grid(10.0, 10.0).expect("valid");
        assert!(map.set_grid_unload_lock(10.0, 10.0, true));
        for _ in 0..5 {
            map.update(1000);
        }
        assert!(map.is_grid_loaded(10.0, 10.0));
        assert_eq!(map.grids_in_state(GridState::Idle), 1);
    }
}
