//! Per-map counters.

use serde::Serialize;

/// Snapshot of a map's state and lifetime counters.
///
/// The first block is sampled when the snapshot is taken; the rest accumulate over
/// the map's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MapStats {
    pub loaded_grids: usize,
    pub residents: usize,
    pub players: usize,
    pub active_objects: usize,
    pub pending_respawns: usize,
    pub detached_corpses: usize,

    pub ticks: u64,
    pub grids_loaded: u64,
    pub grids_unloaded: u64,
    pub objects_loaded: u64,
    pub objects_unloaded: u64,
    pub objects_removed: u64,
    pub load_failures: u64,
    pub respawns: u64,
    pub evacuations: u64,
    pub packets_sent: u64,
    pub blocks_sent: u64,
    pub bytes_sent: u64,
}

impl MapStats {
    /// Adds `other` into `self`, field by field.
    pub fn merge(&mut self, other: &MapStats) {
        self.loaded_grids += other.loaded_grids;
        self.residents += other.residents;
        self.players += other.players;
        self.active_objects += other.active_objects;
        self.pending_respawns += other.pending_respawns;
        self.detached_corpses += other.detached_corpses;
        self.ticks += other.ticks;
        self.grids_loaded += other.grids_loaded;
        self.grids_unloaded += other.grids_unloaded;
        self.objects_loaded += other.objects_loaded;
        self.objects_unloaded += other.objects_unloaded;
        self.objects_removed += other.objects_removed;
        self.load_failures += other.load_failures;
        self.respawns += other.respawns;
        self.evacuations += other.evacuations;
        self.packets_sent += other.packets_sent;
        self.blocks_sent += other.blocks_sent;
        self.bytes_sent += other.bytes_sent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_fields() {
        let mut total = MapStats { players: 1, bytes_sent: 10, ..Default::default() };
        total.merge(&MapStats { players: 2, bytes_sent: 5, grids_loaded: 3, ..Default::default() });
        assert_eq!(total.players, 3);
        assert_eq!(total.bytes_sent, 15);
        assert_eq!(total.grids_loaded, 3);
    }
}
