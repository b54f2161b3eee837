//! # World Services
//!
//! Collaborators a map needs from the outside world, bundled into one context
//! object that is handed to every map at construction:
//!
//! - [`SpawnStore`] - persisted spawn records and respawn times
//! - [`PacketSink`] - delivery of encoded update packets to a connection
//! - [`TerrainProvider`] - height queries
//! - [`Clock`] - wall-clock seconds for respawn timestamps
//! - [`GuidAllocator`] - guid counters shared by every map
//!
//! Tests swap each of these for fakes.

use crate::config::WorldConfig;
use crate::error::PersistenceError;
use crate::grid::{CellCoord, GridCoord};
use crate::persistence::{CorpseRecord, CreatureSpawn, GameObjectSpawn, RespawnKind};
use crate::types::{Difficulty, Guid, GuidAllocator, MapId, MapKey, SpawnId};
use crate::utils::current_timestamp;
use std::sync::Arc;

/// Height returned when no terrain data covers a coordinate.
pub const INVALID_HEIGHT: f32 = -100_000.0;

/// Persistence collaborator.
pub trait SpawnStore: Send + Sync {
    /// Creature spawn ids whose home lies in `cell`.
    fn creature_spawns(&self, map_id: MapId, difficulty: Difficulty, cell: CellCoord) -> Vec<SpawnId>;

    /// Game object spawn ids whose home lies in `cell`.
    fn game_object_spawns(&self, map_id: MapId, difficulty: Difficulty, cell: CellCoord) -> Vec<SpawnId>;

    /// Grids holding at least one spawn or corpse, for preloading.
    fn populated_grids(&self, map_id: MapId, difficulty: Difficulty) -> Vec<GridCoord>;

    /// Corpses lying in `cell`. Corpses ignore difficulty.
    fn corpses(&self, map_id: MapId, cell: CellCoord) -> Vec<CorpseRecord>;

    fn load_creature(&self, spawn_id: SpawnId, map_id: MapId) -> Result<CreatureSpawn, PersistenceError>;

    fn load_game_object(&self, spawn_id: SpawnId, map_id: MapId) -> Result<GameObjectSpawn, PersistenceError>;

    /// Every stored respawn time of a map, as unix seconds.
    fn respawn_times(&self, map: MapKey) -> Vec<(RespawnKind, SpawnId, u64)>;

    fn save_respawn_time(&self, map: MapKey, kind: RespawnKind, spawn_id: SpawnId, respawn_at: u64);

    fn remove_respawn_time(&self, map: MapKey, kind: RespawnKind, spawn_id: SpawnId);
}

/// Network transport collaborator. Receives one opaque packet per recipient.
pub trait PacketSink: Send + Sync {
    fn send(&self, recipient: Guid, packet: Vec<u8>);
}

/// Height/collision collaborator.
pub trait TerrainProvider: Send + Sync {
    /// Ground height at a coordinate, or `None` without data.
    fn height(&self, map_id: MapId, x: f32, y: f32) -> Option<f32>;
}

/// Time source for respawn bookkeeping.
pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        current_timestamp()
    }
}

/// Terrain without data. Every query falls back to [`INVALID_HEIGHT`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTerrain;

impl TerrainProvider for NoTerrain {
    fn height(&self, _map_id: MapId, _x: f32, _y: f32) -> Option<f32> {
        None
    }
}

/// Flat ground at a fixed height.
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrain {
    pub height: f32,
}

impl TerrainProvider for FlatTerrain {
    fn height(&self, _map_id: MapId, _x: f32, _y: f32) -> Option<f32> {
        Some(self.height)
    }
}

/// Sink that drops every packet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPacketSink;

impl PacketSink for NullPacketSink {
    fn send(&self, _recipient: Guid, _packet: Vec<u8>) {}
}

/// Collaborators shared by every map.
#[derive(Clone)]
pub struct WorldServices {
    pub store: Arc<dyn SpawnStore>,
    pub sink: Arc<dyn PacketSink>,
    pub terrain: Arc<dyn TerrainProvider>,
    pub clock: Arc<dyn Clock>,
    pub guids: Arc<GuidAllocator>,
    pub config: Arc<WorldConfig>,
}

impl WorldServices {
    /// Services with the system clock and no terrain data.
    pub fn new(store: Arc<dyn SpawnStore>, sink: Arc<dyn PacketSink>, config: WorldConfig) -> Self {
        Self {
            store,
            sink,
            terrain: Arc::new(NoTerrain),
            clock: Arc::new(SystemClock),
            guids: Arc::new(GuidAllocator::new()),
            config: Arc::new(config),
        }
    }

    pub fn with_terrain(mut self, terrain: Arc<dyn TerrainProvider>) -> Self {
        self.terrain = terrain;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for WorldServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldServices").field("config", &self.config).finish_non_exhaustive()
    }
}
