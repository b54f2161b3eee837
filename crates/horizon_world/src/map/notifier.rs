//! Per-tick visibility and replication dispatch.
//!
//! For every player the map compares the set of entities the client knows with the
//! set it may currently see, and produces one packet holding:
//!
//! - destroy blocks for known entities that left the map
//! - create blocks for newly visible entities
//! - values blocks for known entities with dirty fields
//! - an out-of-range block for known entities no longer visible
//!
//! Dirty masks are cleared only after every player has been served, so all
//! recipients observe the same tick's changes.

use super::Map;
use crate::config::VisibilityConfig;
use crate::grid::ContainerType;
use crate::object::WorldObject;
use crate::replication::{build_create_update_block, build_destroy_block, build_out_of_range_block, build_values_update_block, UpdateData};
use crate::types::Guid;
use crate::visibility::{can_see, sight_range};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

impl Map {
    pub(crate) fn update_visibility(&mut self, diff_ms: u64) {
        self.notify_timer.update(diff_ms);
        let recompute = self.notify_timer.passed();
        if recompute {
            self.notify_timer.reset();
        }

        let config = Arc::clone(&self.services.config);
        let destroyed = std::mem::take(&mut self.pending_destroys);
        let mut outgoing = Vec::with_capacity(self.players.len());

        for &player_guid in self.players.iter() {
            let Some(player) = self.objects.get(&player_guid) else {
                continue;
            };
            let Some(known) = player.player_data().map(|data| &data.client_guids) else {
                continue;
            };

            let visible = if recompute {
                self.visible_set(player, &config.visibility)
            } else {
                known.iter().copied().filter(|guid| self.objects.contains_key(guid)).collect()
            };

            let mut data = UpdateData::new(self.key.map_id);
            for guid in &destroyed {
                if known.contains(guid) && !self.objects.contains_key(guid) {
                    build_destroy_block(*guid, &mut data);
                }
            }

            let mut ordered: Vec<Guid> = visible.iter().copied().collect();
            ordered.sort_unstable();
            for guid in ordered {
                let Some(target) = self.objects.get(&guid) else {
                    continue;
                };
                if !known.contains(&guid) {
                    build_create_update_block(target, player, &mut data);
                } else if target.has_changes() {
                    build_values_update_block(target, player, &mut data);
                }
            }

            let mut gone: Vec<Guid> = known
                .iter()
                .copied()
                .filter(|guid| !visible.contains(guid) && self.objects.contains_key(guid))
                .collect();
            gone.sort_unstable();
            for guid in gone {
                build_out_of_range_block(guid, &mut data);
            }

            outgoing.push((player_guid, data, visible));
        }

        for (player_guid, data, visible) in outgoing {
            if let Some(player) = self.objects.get_mut(&player_guid).and_then(WorldObject::player_data_mut) {
                player.client_guids = visible;
            }
            if !data.has_data() {
                continue;
            }
            let packet = data.build_packet();
            self.stats.packets_sent += 1;
            self.stats.blocks_sent += u64::from(data.block_count());
            self.stats.bytes_sent += packet.len() as u64;
            trace!("📤 {} bytes ({} blocks) to {}", packet.len(), data.block_count(), player_guid);
            self.services.sink.send(player_guid, packet);
        }

        for guid in std::mem::take(&mut self.pending_updates) {
            if let Some(object) = self.objects.get_mut(&guid) {
                object.clear_update_mask();
            }
        }
    }

    /// Entities `observer` may see right now, itself included.
    fn visible_set(&self, observer: &WorldObject, config: &VisibilityConfig) -> HashSet<Guid> {
        let position = observer.position();
        let grid_radius = sight_range(observer, config);
        let world_radius = grid_radius.max(config.world_object_visibility_distance);

        let mut visible = HashSet::new();
        visible.insert(observer.guid());
        for (container, radius) in [(ContainerType::Grid, grid_radius), (ContainerType::World, world_radius)] {
            for guid in self.guids_in_radius(position, radius, Some(container)) {
                if let Some(target) = self.objects.get(&guid) {
                    if can_see(observer, target, config) {
                        visible.insert(guid);
                    }
                }
            }
        }
        visible
    }

    /// Whether `player`'s client currently holds a baseline for `guid`.
    pub fn client_knows(&self, player: Guid, guid: Guid) -> bool {
        self.objects
            .get(&player)
            .and_then(WorldObject::player_data)
            .is_some_and(|data| data.client_guids.contains(&guid))
    }
}
