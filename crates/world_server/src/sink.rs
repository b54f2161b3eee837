//! Packet sink used when no network transport is attached.
//!
//! Traces every packet and keeps running totals for the statistics report.

use horizon_world::{Guid, PacketSink};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

#[derive(Debug, Default)]
pub struct TracingPacketSink {
    packets: AtomicU64,
    bytes: AtomicU64,
}

impl TracingPacketSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl PacketSink for TracingPacketSink {
    fn send(&self, recipient: Guid, packet: Vec<u8>) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(packet.len() as u64, Ordering::Relaxed);
        trace!("📦 {} bytes for {}", packet.len(), recipient);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_world::HighGuid;

    #[test]
    fn totals_accumulate() {
        let sink = TracingPacketSink::new();
        let player = Guid::new(HighGuid::Player, 0, 1);
        sink.send(player, vec![0; 12]);
        sink.send(player, vec![0; 30]);
        assert_eq!(sink.packets(), 2);
        assert_eq!(sink.bytes(), 42);
    }
}
