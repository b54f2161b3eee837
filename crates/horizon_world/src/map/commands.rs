//! Deferred structural changes.
//!
//! Visitors never touch grid storage directly. Anything that would change a
//! container while it is being walked is queued here and applied by the map at its
//! drain point: switches first, then removals, then additions.

use crate::grid::IndexedVec;
use crate::object::WorldObject;
use crate::types::Guid;

/// Queue of pending add, remove and container-switch requests for one map.
#[derive(Debug, Default)]
pub struct MapCommands {
    additions: Vec<WorldObject>,
    removals: IndexedVec<Guid>,
    switches: Vec<(Guid, bool)>,
}

impl MapCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an entity to be added at the next drain point.
    pub fn add(&mut self, object: WorldObject) {
        self.additions.push(object);
    }

    /// Marks an entity for removal. Repeated requests collapse into one.
    pub fn remove(&mut self, guid: Guid) -> bool {
        self.removals.insert(guid)
    }

    /// Queues a move between the grid-object and world-object containers.
    pub fn switch_container(&mut self, guid: Guid, far_visible: bool) {
        match self.switches.iter_mut().find(|(pending, _)| *pending == guid) {
            Some(entry) => entry.1 = far_visible,
            None => self.switches.push((guid, far_visible)),
        }
    }

    pub fn is_removal_pending(&self, guid: Guid) -> bool {
        self.removals.contains(&guid)
    }

    pub fn pending_removals(&self) -> usize {
        self.removals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty() && self.switches.is_empty()
    }

    pub(crate) fn take_switches(&mut self) -> Vec<(Guid, bool)> {
        std::mem::take(&mut self.switches)
    }

    pub(crate) fn pop_removal(&mut self) -> Option<Guid> {
        self.removals.pop_front()
    }

    pub(crate) fn take_additions(&mut self) -> Vec<WorldObject> {
        std::mem::take(&mut self.additions)
    }
}
