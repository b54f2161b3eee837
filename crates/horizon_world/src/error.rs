//! Error types for the world core.
//!
//! Recoverable failures are reported through these enums. Structural invariant
//! violations (field index out of range, double grid insertion, guid exhaustion)
//! are assertions and never show up here.

use crate::grid::GridCoord;
use crate::types::{EntityKind, Guid, MapKey, SpawnId};

/// Errors raised by map and manager operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Invalid map coordinates ({x}, {y})")]
    InvalidCoordinates { x: f32, y: f32 },

    #[error("Grid {0} is scheduled for removal and cannot accept new objects")]
    GridUnavailable(GridCoord),

    #[error("Object {0} not found")]
    ObjectNotFound(Guid),

    #[error("Object {0} is not in world")]
    ObjectNotInWorld(Guid),

    #[error("Map not found: {0}")]
    MapNotFound(MapKey),

    #[error("Map already exists: {0}")]
    MapAlreadyExists(MapKey),

    #[error("Object {0} has no spawn record and cannot respawn")]
    NotRespawnable(Guid),

    #[error("Instance limit of {0} reached")]
    InstanceLimitReached(usize),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Errors raised by the spawn store collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("No {kind} spawn with id {spawn_id}")]
    SpawnNotFound { kind: EntityKind, spawn_id: SpawnId },

    #[error("Spawn {spawn_id} belongs to map {found}, expected {expected}")]
    WrongMap { spawn_id: SpawnId, expected: u32, found: u32 },

    #[error("Corrupt spawn record {spawn_id}: {reason}")]
    Corrupt { spawn_id: SpawnId, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spawn data parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while decoding a replication packet.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unexpected end of packet at offset {offset}, needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("Unknown update type {0}")]
    UnknownUpdateType(u8),

    #[error("Unknown object type id {0}")]
    UnknownObjectType(u8),

    #[error("Update for {0} received before its create block")]
    MissingBaseline(Guid),

    #[error("Field index {index} of {guid} is outside its layout of {limit}")]
    FieldOutOfRange { guid: Guid, index: usize, limit: usize },
}

pub type WorldResult<T> = Result<T, WorldError>;
