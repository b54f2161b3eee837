//! Shared fixtures: a packet sink that records everything, a hand-driven clock and
//! a small harness around one map.

use crate::config::presets;
use crate::map::Map;
use crate::object::WorldObject;
use crate::persistence::{CreatureSpawn, InMemorySpawnStore};
use crate::replication::{decode_packet, ObjectMirror, UpdateBlock};
use crate::services::{Clock, PacketSink, WorldServices};
use crate::types::{EntityKind, Guid, MapKey, Position, SpawnId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Tick length used by every scenario.
pub const TICK_MS: u64 = 100;

/// Packet sink that keeps every packet per recipient.
#[derive(Debug, Default)]
pub struct RecordingPacketSink {
    pub sent_packets: Mutex<HashMap<Guid, Vec<Vec<u8>>>>,
}

impl RecordingPacketSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packet_count(&self, recipient: Guid) -> usize {
        let packets = self.sent_packets.lock().unwrap();
        packets.get(&recipient).map(Vec::len).unwrap_or(0)
    }

    /// Removes and returns the packets queued for `recipient`.
    pub fn take(&self, recipient: Guid) -> Vec<Vec<u8>> {
        let mut packets = self.sent_packets.lock().unwrap();
        packets.remove(&recipient).unwrap_or_default()
    }

    /// Decodes every packet sent to `recipient` so far, in order.
    pub fn blocks(&self, recipient: Guid) -> Vec<UpdateBlock> {
        let packets = self.sent_packets.lock().unwrap();
        packets
            .get(&recipient)
            .into_iter()
            .flatten()
            .flat_map(|packet| decode_packet(packet).expect("well-formed packet").blocks)
            .collect()
    }

    /// Create blocks sent to `recipient` describing `guid`.
    pub fn create_count(&self, recipient: Guid, guid: Guid) -> usize {
        self.blocks(recipient)
            .iter()
            .filter(|block| matches!(block, UpdateBlock::Create { guid: created, .. } if *created == guid))
            .count()
    }

    pub fn clear(&self) {
        self.sent_packets.lock().unwrap().clear();
    }
}

impl PacketSink for RecordingPacketSink {
    fn send(&self, recipient: Guid, packet: Vec<u8>) {
        let mut packets = self.sent_packets.lock().unwrap();
        packets.entry(recipient).or_default().push(packet);
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn advance(&self, seconds: u64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// One continent wired to recording collaborators.
pub struct TestWorld {
    pub map: Map,
    pub sink: Arc<RecordingPacketSink>,
    pub store: Arc<InMemorySpawnStore>,
    pub clock: Arc<ManualClock>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_store(InMemorySpawnStore::new())
    }

    pub fn with_store(store: InMemorySpawnStore) -> Self {
        let sink = Arc::new(RecordingPacketSink::new());
        let store = Arc::new(store);
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let services = WorldServices::new(store.clone(), sink.clone(), presets::testing()).with_clock(clock.clone());
        Self {
            map: Map::new(MapKey::continent(0), services),
            sink,
            store,
            clock,
        }
    }

    pub fn add_player(&mut self, name: &str, x: f32, y: f32) -> Guid {
        let guid = self.map.generate_guid(EntityKind::Player, 0);
        self.map
            .add_to_map(WorldObject::player(guid, name, Position::new(x, y, 0.0)))
            .expect("player placed")
    }

    pub fn add_creature(&mut self, x: f32, y: f32) -> Guid {
        let guid = self.map.generate_guid(EntityKind::Creature, 7);
        self.map
            .add_to_map(WorldObject::creature(guid, Position::new(x, y, 0.0), None))
            .expect("creature placed")
    }

    pub fn add_game_object(&mut self, x: f32, y: f32) -> Guid {
        let guid = self.map.generate_guid(EntityKind::GameObject, 9);
        self.map
            .add_to_map(WorldObject::game_object(guid, Position::new(x, y, 0.0), None))
            .expect("game object placed")
    }

    pub fn tick(&mut self) {
        self.map.update(TICK_MS);
    }

    pub fn ticks(&mut self, count: usize) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Applies every packet queued for `player` to its mirror.
    pub fn sync(&self, mirror: &mut ObjectMirror, player: Guid) {
        for packet in self.sink.take(player) {
            mirror.apply_packet(&packet).expect("mirror accepts packet");
        }
    }
}

pub fn creature_spawn(spawn_id: SpawnId, x: f32, y: f32) -> CreatureSpawn {
    CreatureSpawn {
        spawn_id,
        map_id: 0,
        difficulty: 0,
        entry: 300,
        position: Position::new(x, y, 0.0),
        respawn_delay_secs: 60,
        level: 10,
        health: 150,
        display_id: 21,
        always_active: false,
    }
}
