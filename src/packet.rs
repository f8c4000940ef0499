//! Packets and the arena that owns them for the lifetime of a simulation run.

use crate::types::{PacketId, BROADCAST};

/// A packet in flight (or delivered, or dropped) in the network.
///
/// Packets are immutable after creation except for their two timestamps, which are set exactly
/// once each. They are never removed from the simulation's arena, even once dropped or
/// delivered, so that the metrics reporter can account for every byte ever injected.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Medium id that originated this packet.
    pub source: i64,
    /// Destination medium id, or [`BROADCAST`] for flooded/broadcast control traffic.
    pub dest: i64,
    /// Textual control tag (`"HELLO"`, `"RREQ:..."`, ...). Empty for workload data packets.
    pub content: String,
    /// Size in bytes. Workload packets carry a positive size; pure control packets carry 0.
    pub byte_size: u64,
    /// Tick at which the packet was injected into the network, or `-1` if not yet injected.
    pub time_sent: i64,
    /// Tick at which the packet reached its destination, or `-1` if dropped or still in flight.
    pub time_arrived: i64,
}

impl Packet {
    /// Create a workload data packet (empty content, positive size).
    pub fn data(source: i64, dest: i64, byte_size: u64) -> Self {
        assert!(byte_size > 0, "a data packet must carry a positive size");
        Self {
            source,
            dest,
            content: String::new(),
            byte_size,
            time_sent: -1,
            time_arrived: -1,
        }
    }

    /// Create a control packet carrying `content`, sent by `source`. Control packets are
    /// typically broadcast ([`BROADCAST`] destination), but AODV route replies unicast them back
    /// to a specific upstream.
    pub fn control(source: i64, dest: i64, content: impl Into<String>) -> Self {
        Self {
            source,
            dest,
            content: content.into(),
            byte_size: 0,
            time_sent: -1,
            time_arrived: -1,
        }
    }

    /// A packet carries routing-protocol control traffic, and is exempt from transit-loss
    /// sampling and buffer backpressure accounting.
    pub fn is_control(&self) -> bool {
        !self.content.is_empty()
    }

    /// A packet is addressed to every reachable neighbor rather than one specific destination.
    pub fn is_broadcast(&self) -> bool {
        self.dest == BROADCAST
    }
}

/// Owns every packet created during a simulation run, indexed by [`PacketId`].
///
/// Packets are never deleted: the arena is the single source of truth the metrics reporter reads
/// from once the run terminates.
#[derive(Debug, Default)]
pub struct PacketArena {
    packets: Vec<Packet>,
}

impl PacketArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new packet and return the id it was assigned.
    pub fn insert(&mut self, packet: Packet) -> PacketId {
        let id = PacketId(self.packets.len());
        self.packets.push(packet);
        id
    }

    /// Borrow a packet by id.
    pub fn get(&self, id: PacketId) -> &Packet {
        &self.packets[id.0]
    }

    /// Mutably borrow a packet by id.
    pub fn get_mut(&mut self, id: PacketId) -> &mut Packet {
        &mut self.packets[id.0]
    }

    /// Iterate over every packet ever created in this run.
    pub fn iter(&self) -> impl Iterator<Item = &Packet> {
        self.packets.iter()
    }

    /// Number of packets ever created (delivered, dropped, or still in flight).
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether the arena holds no packets.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
