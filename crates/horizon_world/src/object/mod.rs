//! # World Objects
//!
//! Entity storage for the world core.
//!
//! - [`fields`] - value slots and dynamic arrays with per-index dirty tracking
//! - [`layout`] - per-kind field indices and visibility classes
//! - [`WorldObject`] - one entity with its placement, membership and kind data
//!
//! ## Field writes
//!
//! `set_*` always marks the field dirty. `update_*` compares first and skips the
//! write when nothing changed. Use `update_*` on hot paths.

pub mod fields;
pub mod layout;
mod entity;

pub use entity::{
    CombatState, CorpseData, CreatureData, DeathState, DynamicObjectData, GameObjectData, GridSlot,
    KindData, ObjectLinks, PlayerData, SpawnInfo, WorldObject, PHASEMASK_NORMAL,
};
pub use fields::{DynamicFields, UpdateMask, ValueFields};
pub use layout::{field_flags, layout_for, FieldLayout};
