//! Grid cells and their per-kind entity containers.

use super::container::IndexedVec;
use crate::types::{EntityKind, Guid};
use serde::{Deserialize, Serialize};

/// Which of a cell's two container sets an entity lives in.
///
/// World objects are visible across larger distances (players, far-visible
/// objects) and are searched with the wider world visibility radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerType {
    Grid,
    World,
}

/// One container per [`EntityKind`].
#[derive(Debug, Clone, Default)]
pub struct KindContainers {
    containers: [IndexedVec<Guid>; EntityKind::COUNT],
}

impl KindContainers {
    pub fn get(&self, kind: EntityKind) -> &IndexedVec<Guid> {
        &self.containers[kind.index()]
    }

    pub fn get_mut(&mut self, kind: EntityKind) -> &mut IndexedVec<Guid> {
        &mut self.containers[kind.index()]
    }

    pub fn len(&self) -> usize {
        self.containers.iter().map(IndexedVec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.iter().all(IndexedVec::is_empty)
    }
}

/// Smallest spatial unit of a grid.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    grid_objects: KindContainers,
    world_objects: KindContainers,
}

impl Cell {
    pub fn container(&self, container: ContainerType, kind: EntityKind) -> &IndexedVec<Guid> {
        match container {
            ContainerType::Grid => self.grid_objects.get(kind),
            ContainerType::World => self.world_objects.get(kind),
        }
    }

    pub fn container_mut(&mut self, container: ContainerType, kind: EntityKind) -> &mut IndexedVec<Guid> {
        match container {
            ContainerType::Grid => self.grid_objects.get_mut(kind),
            ContainerType::World => self.world_objects.get_mut(kind),
        }
    }

    /// Every guid in the cell, both container sets, all kinds.
    pub fn all_guids(&self) -> Vec<Guid> {
        let mut guids = Vec::with_capacity(self.len());
        for kind in EntityKind::ALL {
            guids.extend(self.grid_objects.get(kind).iter().copied());
            guids.extend(self.world_objects.get(kind).iter().copied());
        }
        guids
    }

    pub fn len(&self) -> usize {
        self.grid_objects.len() + self.world_objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid_objects.is_empty() && self.world_objects.is_empty()
    }
}
