//! # Maps
//!
//! A [`Map`] is one live copy of a world definition. It owns every entity resident
//! in it, the grid storage that indexes those entities spatially, and the per-tick
//! pipeline that keeps clients in sync.
//!
//! ## Ownership
//!
//! The map's object store is the single owner of entities. Grid cells hold guids
//! only, so a visitor walking a cell borrows the store immutably and queues any
//! structural change on [`MapCommands`], which the map drains at a fixed point of
//! its update.
//!
//! ## Update Order
//!
//! 1. Due respawns whose grid is loaded
//! 2. Entity timers in active grids
//! 3. Drain of queued switches, removals and additions
//! 4. Visibility and replication dispatch
//! 5. Grid activity, idling and unloading
//! 6. Delayed respawn-time flush
//!
//! Structural operations live in submodules as further `impl Map` blocks:
//! `lifecycle` loads and unloads grids, `search` visits cells, `notifier`
//! builds update packets and `respawn` keeps respawn times.

mod commands;
mod lifecycle;
mod manager;
mod notifier;
mod respawn;
mod search;
mod stats;

pub use commands::MapCommands;
pub use manager::{MapHandle, MapManager, ManagerStats};
pub use respawn::RespawnTable;
pub use search::CellVisitor;
pub use stats::MapStats;

use crate::config::WorldConfig;
use crate::error::{WorldError, WorldResult};
use crate::grid::{
    compute_cell_coord, compute_grid_coord, is_valid_map_coord, CellCoord, CellTouchSet, ContainerType, GridCoord,
    GridState, GridTable, IndexedVec, TimeTracker,
};
use crate::object::{GridSlot, KindData, WorldObject};
use crate::services::{WorldServices, INVALID_HEIGHT};
use crate::types::{EntityKind, Guid, MapKey, Position, SpawnId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Result of moving an entity inside its map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    /// The entity now stands at the requested position.
    Moved,
    /// The destination grid was unavailable; the entity was sent to its home.
    ReturnedHome,
    /// Neither destination nor home was available; removal was queued.
    RemovalQueued,
}

/// One live map: grids, resident entities and their replication state.
#[derive(Debug)]
pub struct Map {
    key: MapKey,
    services: WorldServices,
    grids: GridTable,
    objects: HashMap<Guid, WorldObject>,
    players: IndexedVec<Guid>,
    /// Non-player entities that keep grids loaded like players do.
    active: IndexedVec<Guid>,
    commands: MapCommands,
    respawns: RespawnTable,
    touched: CellTouchSet,
    creature_by_spawn: HashMap<SpawnId, Guid>,
    game_object_by_spawn: HashMap<SpawnId, Guid>,
    /// Corpse guid per owner. Survives grid unloads so reloading is idempotent.
    corpses_by_owner: HashMap<Guid, Guid>,
    /// Corpses whose grid unloaded, waiting for it to load again.
    detached_corpses: HashMap<Guid, WorldObject>,
    /// Entities with dirty fields since the last dispatch.
    pending_updates: HashSet<Guid>,
    /// Entities that left the map since the last dispatch.
    pending_destroys: Vec<Guid>,
    unload_enabled: bool,
    notify_timer: TimeTracker,
    respawn_flush_timer: TimeTracker,
    uptime_ms: u64,
    stats: MapStats,
}

impl Map {
    /// Creates an empty map and restores its stored respawn times.
    pub fn new(key: MapKey, services: WorldServices) -> Self {
        let config = &services.config;
        let mut respawns = RespawnTable::new();
        for (kind, spawn_id, respawn_at) in services.store.respawn_times(key) {
            respawns.restore(kind, spawn_id, respawn_at);
        }
        let mut map = Self {
            key,
            grids: GridTable::new(),
            objects: HashMap::new(),
            players: IndexedVec::new(),
            active: IndexedVec::new(),
            commands: MapCommands::new(),
            touched: CellTouchSet::default(),
            creature_by_spawn: HashMap::new(),
            game_object_by_spawn: HashMap::new(),
            corpses_by_owner: HashMap::new(),
            detached_corpses: HashMap::new(),
            pending_updates: HashSet::new(),
            pending_destroys: Vec::new(),
            unload_enabled: config.grid.unload_enabled,
            notify_timer: TimeTracker::new(config.visibility.notify_period_ms),
            respawn_flush_timer: TimeTracker::new(config.respawn.flush_interval_ms),
            uptime_ms: 0,
            stats: MapStats::default(),
            respawns,
            services,
        };
        if map.services.config.grid.preload_all {
            map.preload_all_grids();
        }
        info!("🗺️ Created {} ({} stored respawn times)", key, map.respawns.len());
        map
    }

    pub fn key(&self) -> MapKey {
        self.key
    }

    pub fn services(&self) -> &WorldServices {
        &self.services
    }

    pub fn config(&self) -> &WorldConfig {
        &self.services.config
    }

    /// Milliseconds of simulated time this map has run.
    pub fn uptime_ms(&self) -> u64 {
        self.uptime_ms
    }

    /// Hands out a fresh guid from the shared allocator.
    pub fn generate_guid(&self, kind: EntityKind, entry: u32) -> Guid {
        self.services.guids.next(kind, entry)
    }

    // ---- grid queries ----

    pub fn is_grid_loaded(&self, x: f32, y: f32) -> bool {
        self.grids.contains(compute_grid_coord(x, y))
    }

    /// Whether the grid containing `(x, y)` is scheduled for unloading.
    pub fn is_removal_grid(&self, x: f32, y: f32) -> bool {
        self.grid_state(compute_grid_coord(x, y)) == Some(GridState::Removal)
    }

    pub fn grid_state(&self, coord: GridCoord) -> Option<GridState> {
        self.grids.get(coord).map(|grid| grid.state())
    }

    pub fn loaded_grids(&self) -> Vec<GridCoord> {
        self.grids.coords()
    }

    /// Loads the grid containing `(x, y)` if needed.
    pub fn load_grid(&mut self, x: f32, y: f32) -> WorldResult<()> {
        if !is_valid_map_coord(x, y) {
            return Err(WorldError::InvalidCoordinates { x, y });
        }
        self.ensure_grid_loaded(compute_grid_coord(x, y));
        Ok(())
    }

    /// Pins a loaded grid in memory regardless of activity.
    pub fn set_grid_unload_lock(&mut self, x: f32, y: f32, locked: bool) -> bool {
        match self.grids.get_mut(compute_grid_coord(x, y)) {
            Some(grid) => {
                grid.info_mut().set_unload_lock(locked);
                true
            }
            None => false,
        }
    }

    /// Map-wide switch for idle unloading. Instances that must persist turn it off.
    pub fn set_unload_enabled(&mut self, enabled: bool) {
        self.unload_enabled = enabled;
    }

    pub fn is_cell_touched(&self, cell: CellCoord) -> bool {
        self.touched.is_marked(cell)
    }

    pub fn touched_cell_count(&self) -> usize {
        self.touched.marked_count()
    }

    /// Ground height at `(x, y)`, or [`INVALID_HEIGHT`] without terrain data.
    pub fn height_at(&self, x: f32, y: f32) -> f32 {
        self.services.terrain.height(self.key.map_id, x, y).unwrap_or(INVALID_HEIGHT)
    }

    fn grid_accepts(&self, coord: GridCoord) -> bool {
        self.grids.get(coord).is_some_and(|grid| grid.state().accepts_objects())
    }

    // ---- entity access ----

    pub fn get_object(&self, guid: Guid) -> Option<&WorldObject> {
        self.objects.get(&guid)
    }

    fn get_of_kind(&self, guid: Guid, kind: EntityKind) -> Option<&WorldObject> {
        self.objects.get(&guid).filter(|object| object.kind() == kind)
    }

    pub fn get_player(&self, guid: Guid) -> Option<&WorldObject> {
        self.get_of_kind(guid, EntityKind::Player)
    }

    pub fn get_creature(&self, guid: Guid) -> Option<&WorldObject> {
        self.get_of_kind(guid, EntityKind::Creature)
    }

    pub fn get_game_object(&self, guid: Guid) -> Option<&WorldObject> {
        self.get_of_kind(guid, EntityKind::GameObject)
    }

    pub fn get_dynamic_object(&self, guid: Guid) -> Option<&WorldObject> {
        self.get_of_kind(guid, EntityKind::DynamicObject)
    }

    pub fn get_corpse(&self, guid: Guid) -> Option<&WorldObject> {
        self.get_of_kind(guid, EntityKind::Corpse)
    }

    pub fn creature_by_spawn_id(&self, spawn_id: SpawnId) -> Option<&WorldObject> {
        self.creature_by_spawn.get(&spawn_id).and_then(|guid| self.objects.get(guid))
    }

    pub fn game_object_by_spawn_id(&self, spawn_id: SpawnId) -> Option<&WorldObject> {
        self.game_object_by_spawn.get(&spawn_id).and_then(|guid| self.objects.get(guid))
    }

    pub fn corpse_by_owner(&self, owner: Guid) -> Option<&WorldObject> {
        self.corpses_by_owner.get(&owner).and_then(|guid| self.objects.get(guid))
    }

    pub fn contains(&self, guid: Guid) -> bool {
        self.objects.contains_key(&guid)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn players(&self) -> Vec<Guid> {
        self.players.as_slice().to_vec()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active_object(&self, guid: Guid) -> bool {
        self.active.contains(&guid)
    }

    /// Mutates a resident entity. Dirty fields are picked up by the next dispatch.
    pub fn with_object_mut<R>(&mut self, guid: Guid, f: impl FnOnce(&mut WorldObject) -> R) -> WorldResult<R> {
        let object = self.objects.get_mut(&guid).ok_or(WorldError::ObjectNotFound(guid))?;
        let result = f(object);
        if object.has_changes() {
            self.pending_updates.insert(guid);
        }
        Ok(result)
    }

    pub fn commands(&mut self) -> &mut MapCommands {
        &mut self.commands
    }

    // ---- membership ----

    /// Inserts an entity into the map, loading its grid first.
    ///
    /// Non-active entities are refused by grids scheduled for removal; players and
    /// always-active entities revive such a grid instead.
    pub fn add_to_map(&mut self, object: WorldObject) -> WorldResult<Guid> {
        let position = object.position();
        if !is_valid_map_coord(position.x, position.y) {
            return Err(WorldError::InvalidCoordinates { x: position.x, y: position.y });
        }
        let coord = compute_grid_coord(position.x, position.y);
        let activator = object.is_player() || object.is_always_active();
        if !activator && self.grid_state(coord) == Some(GridState::Removal) {
            return Err(WorldError::GridUnavailable(coord));
        }
        self.ensure_grid_loaded(coord);
        let guid = self.attach(object);
        debug!("➕ Added {} to {} at grid {}", guid, self.key, coord);
        Ok(guid)
    }

    /// Removes an entity immediately and hands it back.
    ///
    /// With `cleanup` the entity's links to other entities are severed first, which
    /// is what deletion needs. Without it the links travel with the entity, which is
    /// what a transfer to another map needs.
    pub fn remove_from_map(&mut self, guid: Guid, cleanup: bool) -> WorldResult<WorldObject> {
        if !self.objects.contains_key(&guid) {
            return Err(WorldError::ObjectNotFound(guid));
        }
        if cleanup {
            self.sever_links(guid);
        }
        let object = self.detach(guid).ok_or(WorldError::ObjectNotFound(guid))?;
        self.forget_corpse(&object);
        Ok(object)
    }

    /// Queues an entity for removal at the next drain point.
    pub fn request_removal(&mut self, guid: Guid) -> bool {
        self.objects.contains_key(&guid) && self.commands.remove(guid)
    }

    /// Queues an entity for insertion at the next drain point.
    pub fn request_addition(&mut self, object: WorldObject) {
        self.commands.add(object);
    }

    pub fn add_to_active(&mut self, guid: Guid) -> WorldResult<()> {
        let object = self.objects.get_mut(&guid).ok_or(WorldError::ObjectNotFound(guid))?;
        if !object.is_player() {
            object.set_always_active(true);
            self.active.insert(guid);
        }
        Ok(())
    }

    pub fn remove_from_active(&mut self, guid: Guid) -> WorldResult<()> {
        let object = self.objects.get_mut(&guid).ok_or(WorldError::ObjectNotFound(guid))?;
        object.set_always_active(false);
        self.active.remove(&guid);
        Ok(())
    }

    /// Marks an entity as visible from world-object distance. The container switch
    /// happens at the next drain point.
    pub fn set_far_visible(&mut self, guid: Guid, far_visible: bool) -> WorldResult<()> {
        if !self.objects.contains_key(&guid) {
            return Err(WorldError::ObjectNotFound(guid));
        }
        self.commands.switch_container(guid, far_visible);
        Ok(())
    }

    /// Sets an entity's sight extension. Extensions beyond the default sight range
    /// move the entity into the world-object container so searches still find it.
    pub fn set_sight_extension(&mut self, guid: Guid, extension: f32) -> WorldResult<()> {
        let visibility_distance = self.services.config.visibility.visibility_distance;
        let object = self.objects.get_mut(&guid).ok_or(WorldError::ObjectNotFound(guid))?;
        object.visibility.sight_extension = extension.max(0.0);
        let wants_far = extension > visibility_distance;
        if wants_far != object.is_far_visible() && !object.is_player() {
            self.commands.switch_container(guid, wants_far);
        }
        Ok(())
    }

    /// Moves an in-world entity, following it with grid storage.
    ///
    /// Players and active entities load the destination grid. Ordinary creatures
    /// heading into an unavailable grid are sent home instead, or queued for removal
    /// when home is unavailable too.
    ///
    /// # Panics
    ///
    /// Panics if the entity is resident but not in world.
    pub fn relocate(&mut self, guid: Guid, position: Position) -> WorldResult<Relocation> {
        if !is_valid_map_coord(position.x, position.y) {
            return Err(WorldError::InvalidCoordinates { x: position.x, y: position.y });
        }
        let object = self.objects.get(&guid).ok_or(WorldError::ObjectNotFound(guid))?;
        assert!(object.is_in_world(), "{guid} relocated while not in world");
        let Some(slot) = object.grid_slot() else {
            panic!("{guid} is in world without a grid slot");
        };

        let target = compute_cell_coord(position.x, position.y);
        if target == slot.cell {
            self.set_object_position(guid, position);
            return Ok(Relocation::Moved);
        }

        if object.is_player() || object.is_always_active() {
            self.ensure_grid_loaded(target.grid());
            self.move_between_cells(guid, target, position);
            return Ok(Relocation::Moved);
        }
        if self.grid_accepts(target.grid()) {
            self.move_between_cells(guid, target, position);
            return Ok(Relocation::Moved);
        }

        let home = (object.kind() == EntityKind::Creature)
            .then(|| object.spawn_info().map(|spawn| spawn.home))
            .flatten();
        if let Some(home) = home {
            let home_cell = compute_cell_coord(home.x, home.y);
            if self.grid_accepts(home_cell.grid()) {
                self.move_between_cells(guid, home_cell, home);
                debug!("🏠 {} returned home instead of entering unloaded grid {}", guid, target.grid());
                return Ok(Relocation::ReturnedHome);
            }
        }
        self.commands.remove(guid);
        debug!("🚫 {} could not enter grid {} and has no loaded home; removal queued", guid, target.grid());
        Ok(Relocation::RemovalQueued)
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> MapStats {
        let mut stats = self.stats.clone();
        stats.loaded_grids = self.grids.loaded_count();
        stats.residents = self.objects.len();
        stats.players = self.players.len();
        stats.active_objects = self.active.len();
        stats.pending_respawns = self.respawns.len();
        stats.detached_corpses = self.detached_corpses.len();
        stats
    }

    // ---- update ----

    /// Runs one simulation tick of `diff_ms` milliseconds.
    pub fn update(&mut self, diff_ms: u64) {
        self.uptime_ms += diff_ms;
        self.touched.reset();

        self.process_respawns();
        self.update_objects(diff_ms);
        self.remove_all_objects_in_remove_list();
        self.update_visibility(diff_ms);
        self.update_grids(diff_ms);
        self.update_respawn_flush(diff_ms);

        self.stats.ticks += 1;
    }

    fn update_objects(&mut self, diff_ms: u64) {
        let guids: Vec<Guid> = self
            .grids
            .iter()
            .filter(|grid| grid.state() == GridState::Active)
            .flat_map(|grid| grid.all_guids())
            .collect();
        for guid in guids {
            let Some(object) = self.objects.get_mut(&guid) else {
                continue;
            };
            let expired = object.tick(diff_ms);
            if object.has_changes() {
                self.pending_updates.insert(guid);
            }
            if expired {
                self.commands.remove(guid);
            }
        }
    }

    /// Applies queued container switches, then removals, then additions.
    pub fn remove_all_objects_in_remove_list(&mut self) {
        for (guid, far_visible) in self.commands.take_switches() {
            self.switch_container(guid, far_visible);
        }

        while let Some(guid) = self.commands.pop_removal() {
            if !self.objects.contains_key(&guid) {
                continue;
            }
            self.sever_links(guid);
            if let Some(object) = self.detach(guid) {
                self.forget_corpse(&object);
                self.stats.objects_removed += 1;
            }
        }

        for object in self.commands.take_additions() {
            let guid = object.guid();
            if let Err(e) = self.add_to_map(object) {
                warn!("⚠️ Dropped queued addition of {} on {}: {}", guid, self.key, e);
            }
        }
    }

    // ---- storage internals ----

    /// Inserts an entity into its cell container and every index. The grid must
    /// be loaded.
    ///
    /// # Panics
    ///
    /// Panics on a missing grid or a double insertion.
    pub(crate) fn attach(&mut self, mut object: WorldObject) -> Guid {
        let guid = object.guid();
        assert!(!self.objects.contains_key(&guid), "{guid} added to {} twice", self.key);
        let position = object.position();
        let cell = compute_cell_coord(position.x, position.y);
        let container = object.wanted_container();
        let Some(grid) = self.grids.get_mut(cell.grid()) else {
            panic!("grid {} is not loaded for {guid}", cell.grid());
        };
        let inserted = grid.cell_mut(cell).container_mut(container, object.kind()).insert(guid);
        assert!(inserted, "{guid} inserted into cell {cell} twice");

        object.set_grid_slot(Some(GridSlot { cell, container }));
        object.set_current_map(Some(self.key));
        object.set_in_world(true);

        match &mut object.data {
            KindData::Player(player) => {
                player.client_guids.clear();
                self.players.insert(guid);
            }
            KindData::Creature(creature) => {
                if let Some(spawn) = creature.spawn {
                    self.creature_by_spawn.insert(spawn.spawn_id, guid);
                }
            }
            KindData::GameObject(game_object) => {
                if let Some(spawn) = game_object.spawn {
                    self.game_object_by_spawn.insert(spawn.spawn_id, guid);
                }
            }
            KindData::Corpse(corpse) => {
                self.corpses_by_owner.insert(corpse.owner, guid);
            }
            KindData::DynamicObject(_) => {}
        }
        if object.is_always_active() && !object.is_player() {
            self.active.insert(guid);
        }
        if object.has_changes() {
            self.pending_updates.insert(guid);
        }
        self.objects.insert(guid, object);
        guid
    }

    /// Takes an entity out of grid storage and every index except the corpse-owner
    /// map, and queues destroy notifications for clients that know it.
    pub(crate) fn detach(&mut self, guid: Guid) -> Option<WorldObject> {
        let mut object = self.objects.remove(&guid)?;
        if let Some(slot) = object.grid_slot() {
            if let Some(grid) = self.grids.get_mut(slot.cell.grid()) {
                // Already absent when the unloader popped it.
                grid.cell_mut(slot.cell).container_mut(slot.container, object.kind()).remove(&guid);
            }
        }
        self.players.remove(&guid);
        self.active.remove(&guid);
        self.pending_updates.remove(&guid);
        if let Some(spawn_id) = object.spawn_id() {
            let index = match object.kind() {
                EntityKind::GameObject => &mut self.game_object_by_spawn,
                _ => &mut self.creature_by_spawn,
            };
            if index.get(&spawn_id) == Some(&guid) {
                index.remove(&spawn_id);
            }
        }
        if let Some(player) = object.player_data_mut() {
            player.client_guids.clear();
        }
        object.set_grid_slot(None);
        object.set_current_map(None);
        object.set_in_world(false);
        self.pending_destroys.push(guid);
        Some(object)
    }

    fn forget_corpse(&mut self, object: &WorldObject) {
        if let KindData::Corpse(corpse) = &object.data {
            if self.corpses_by_owner.get(&corpse.owner) == Some(&object.guid()) {
                self.corpses_by_owner.remove(&corpse.owner);
            }
        }
    }

    fn set_object_position(&mut self, guid: Guid, position: Position) {
        if let Some(object) = self.objects.get_mut(&guid) {
            object.set_position(position);
        }
    }

    /// Moves an entity between cells, keeping its container type.
    pub(crate) fn move_between_cells(&mut self, guid: Guid, target: CellCoord, position: Position) {
        let Some(object) = self.objects.get_mut(&guid) else {
            return;
        };
        let kind = object.kind();
        let Some(slot) = object.grid_slot() else {
            panic!("{guid} moved without a grid slot");
        };
        if let Some(grid) = self.grids.get_mut(slot.cell.grid()) {
            grid.cell_mut(slot.cell).container_mut(slot.container, kind).remove(&guid);
        }
        let Some(grid) = self.grids.get_mut(target.grid()) else {
            panic!("grid {} is not loaded for {guid}", target.grid());
        };
        grid.cell_mut(target).container_mut(slot.container, kind).insert(guid);
        object.set_grid_slot(Some(GridSlot { cell: target, container: slot.container }));
        object.set_position(position);
    }

    fn switch_container(&mut self, guid: Guid, far_visible: bool) {
        let Some(object) = self.objects.get_mut(&guid) else {
            return;
        };
        if object.is_far_visible() == far_visible {
            return;
        }
        object.set_far_visible(far_visible);
        let Some(slot) = object.grid_slot() else {
            return;
        };
        let wanted = object.wanted_container();
        if wanted == slot.container {
            return;
        }
        let kind = object.kind();
        if let Some(grid) = self.grids.get_mut(slot.cell.grid()) {
            let cell = grid.cell_mut(slot.cell);
            cell.container_mut(slot.container, kind).remove(&guid);
            cell.container_mut(wanted, kind).insert(guid);
        }
        object.set_grid_slot(Some(GridSlot { cell: slot.cell, container: wanted }));
        debug!(
            "🔭 {} switched to the {} container",
            guid,
            if wanted == ContainerType::World { "world" } else { "grid" }
        );
    }

    // ---- links ----

    /// Records `summon` as summoned by `summoner`.
    pub fn link_summon(&mut self, summoner: Guid, summon: Guid) -> WorldResult<()> {
        if !self.objects.contains_key(&summoner) {
            return Err(WorldError::ObjectNotFound(summoner));
        }
        let child = self.objects.get_mut(&summon).ok_or(WorldError::ObjectNotFound(summon))?;
        child.links.summoner = Some(summoner);
        if let Some(parent) = self.objects.get_mut(&summoner) {
            if !parent.links.summons.contains(&summon) {
                parent.links.summons.push(summon);
            }
        }
        Ok(())
    }

    /// Records an aura cast by `caster` on `target`.
    pub fn link_aura(&mut self, caster: Guid, target: Guid) -> WorldResult<()> {
        if !self.objects.contains_key(&caster) {
            return Err(WorldError::ObjectNotFound(caster));
        }
        let object = self.objects.get_mut(&target).ok_or(WorldError::ObjectNotFound(target))?;
        if !object.links.aura_casters.contains(&caster) {
            object.links.aura_casters.push(caster);
        }
        if let Some(source) = self.objects.get_mut(&caster) {
            if !source.links.aura_targets.contains(&target) {
                source.links.aura_targets.push(target);
            }
        }
        Ok(())
    }

    /// Spawns an area effect owned by `caster` and records the link.
    pub fn spawn_area_effect(
        &mut self,
        caster: Guid,
        spell_id: u32,
        radius: f32,
        duration_ms: Option<u64>,
        position: Position,
    ) -> WorldResult<Guid> {
        if !self.objects.contains_key(&caster) {
            return Err(WorldError::ObjectNotFound(caster));
        }
        let guid = self.generate_guid(EntityKind::DynamicObject, 0);
        let effect = WorldObject::dynamic_object(guid, caster, spell_id, radius, duration_ms, position);
        self.add_to_map(effect)?;
        if let Some(owner) = self.objects.get_mut(&caster) {
            owner.links.area_effects.push(guid);
        }
        Ok(guid)
    }
}
