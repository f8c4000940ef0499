//! Module containing the basic identifier and index types shared across the crate.

use clap::ValueEnum;
use std::fmt;

/// Identifier of a medium (host, router, or link), and its index into the simulation's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediumId(pub usize);

impl fmt::Display for MediumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

impl From<usize> for MediumId {
    fn from(x: usize) -> Self {
        Self(x)
    }
}

/// Sentinel destination meaning "broadcast to all reachable media".
pub const BROADCAST: i64 = -1;

/// Identifier of a packet, and its index into the simulation's packet arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketId(pub usize);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// An integer simulation tick. Ticks start at 0, and `Network::run` advances them one at a time
/// up to a configured limit.
pub type Tick = u64;

/// Which routing algorithm a medium with `logic = true` should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// Flood every packet to all neighbors, with a bounded dedup cache.
    Flooding,
    /// Omniscient greedy Dijkstra router (theoretical upper bound).
    Omniscient,
    /// AODV-style reactive distance-vector routing.
    Aodv,
    /// Simplified path-vector routing (BGP-lite).
    #[value(name = "bgp-lite")]
    BgpLite,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Algorithm::Flooding => "flooding",
            Algorithm::Omniscient => "omniscient",
            Algorithm::Aodv => "aodv",
            Algorithm::BgpLite => "bgp-lite",
        };
        write!(f, "{s}")
    }
}
