//! # Horizon World
//!
//! The spatial world core of the Horizon world server: grid-streamed maps, the
//! entities living in them, and differential replication of entity state to the
//! players who can see it.
//!
//! ## Core Features
//!
//! - **Grid Streaming**: Maps are split into a `64 × 64` arena of grids that load
//!   on demand around players and unload after an idle period
//! - **Single Ownership**: A map owns its entities; grid cells only index guids
//! - **Deferred Mutation**: Visitors queue structural changes, applied at a fixed
//!   drain point of every tick
//! - **Differential Replication**: Per-field dirty masks produce create, values,
//!   out-of-range and destroy blocks, filtered by what each recipient may read
//! - **Visibility**: Phases, sight ranges, stealth and invisibility channels
//! - **Respawns**: Persisted spawn ids carry respawn times across grid unloads
//! - **Parallel Maps**: A [`MapManager`] updates every live map on a worker pool
//!
//! ## Architecture Overview
//!
//! ```text
//! MapManager ── Map ─┬─ object store (Guid → WorldObject)
//!                    ├─ GridTable ── Grid ── Cell ── guid containers
//!                    ├─ MapCommands (switches, removals, additions)
//!                    ├─ RespawnTable
//!                    └─ WorldServices (store, sink, terrain, clock, guids)
//! ```
//!
//! ## Quick Start Example
//!
//! ```rust,no_run
//! use horizon_world::*;
//! use std::sync::Arc;
//!
//! let services = WorldServices::new(
//!     Arc::new(InMemorySpawnStore::new()),
//!     Arc::new(NullPacketSink),
//!     WorldConfig::default(),
//! );
//! let manager = MapManager::new(services).expect("worker pool");
//! let map = manager.get_or_create_map(0);
//!
//! let guid = manager.services().guids.next(EntityKind::Player, 0);
//! let player = WorldObject::player(guid, "Ana", Position::new(0.0, 0.0, 0.0));
//! map.lock().unwrap().add_to_map(player).expect("valid position");
//!
//! manager.update(100);
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod map;
pub mod object;
pub mod persistence;
pub mod replication;
pub mod services;
pub mod types;
pub mod utils;
pub mod visibility;

#[cfg(test)]
mod tests;

pub use config::{ConfigValidationError, WorldConfig, WorldConfigBuilder};
pub use error::{DecodeError, PersistenceError, WorldError, WorldResult};
pub use grid::{CellCoord, ContainerType, GridCoord, GridState};
pub use map::{CellVisitor, Map, MapCommands, MapHandle, MapManager, MapStats, ManagerStats, Relocation};
pub use object::{DeathState, KindData, SpawnInfo, WorldObject};
pub use persistence::{CorpseRecord, CreatureSpawn, GameObjectSpawn, InMemorySpawnStore, RespawnKind, SpawnData};
pub use replication::{decode_packet, ObjectMirror, UpdateBlock, UpdateData};
pub use services::{
    Clock, FlatTerrain, NoTerrain, NullPacketSink, PacketSink, SpawnStore, SystemClock, TerrainProvider,
    WorldServices, INVALID_HEIGHT,
};
pub use types::{EntityKind, Guid, GuidAllocator, HighGuid, MapKey, Position, SpawnId};
