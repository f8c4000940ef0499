//! The transport element shared by hosts, routers, and physical links.
//!
//! A [`Medium`] is a capability set (`receive`, `advance_in_transit`, `process`, `periodic_tick`,
//! `count_buffers`) carried by a common header and dispatched on a tagged [`MediumKind`], rather
//! than through a trait object or a generic type parameter. The variant set is fixed by this
//! crate's scope (a flooding router, an omniscient router, AODV, BGP-lite, or a plain link with
//! no logic at all), so a closed enum is simpler than an open-ended trait hierarchy while still
//! keeping every protocol's state colocated with the medium it belongs to.

pub mod aodv;
pub mod bgplite;
pub mod flooding;
pub mod omniscient;

use crate::packet::{Packet, PacketArena};
use crate::types::{Algorithm, MediumId, PacketId, Tick, BROADCAST};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::VecDeque;

pub use aodv::AodvState;
pub use bgplite::BgpLiteState;
pub use flooding::FloodingState;
pub use omniscient::OmniscientState;

/// Capacity shared by every bounded router queue (`in`, `out`, `routing`/`route_pending`,
/// `seen`), unless a variant documents otherwise.
pub const BUFFER_CAP: usize = 200;

/// Identifies who handed a packet to a medium for this hop.
///
/// `medium` is the raw upstream medium id, used by plain links to exclude it when
/// broadcast-forwarding. `router` is the neighbor *router's* integer id, resolved by
/// [`crate::network::Network`] at delivery time (a router's only neighbors in the connection
/// graph are links, so routing protocols need one extra hop of resolution to learn who is on the
/// other side of the link that just delivered a packet to them).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sender {
    /// The medium that physically delivered this packet, or `None` for injected/self-originated
    /// packets.
    pub medium: Option<MediumId>,
    /// The neighbor router's id, or `None` if unresolved or not applicable.
    pub router: Option<i64>,
}

/// A packet that finished service at a medium and is awaiting dispatch to a neighbor, produced by
/// [`Medium::process`] or [`Medium::periodic_tick`].
///
/// The actual admission check against the target's capacity happens in
/// [`crate::network::Network`], since it requires looking at a *different* medium than the one
/// that produced this request.
#[derive(Debug, Clone, Copy)]
pub struct PendingSend {
    /// Medium this packet should be handed to next.
    pub target: MediumId,
    /// The packet to send.
    pub packet: PacketId,
}

/// A single in-flight packet occupying one of a medium's pathways.
#[derive(Debug, Clone)]
pub struct InTransit {
    pub(crate) packet: PacketId,
    pub(crate) upstream: Sender,
    pub(crate) remaining: f64,
}

/// The protocol-specific state and behavior a medium runs, tagged by variant.
#[derive(Debug)]
pub enum MediumKind {
    /// A physical link: no logic, passive broadcast, no buffering.
    Link,
    /// Flooding baseline router.
    Flooding(FloodingState),
    /// Omniscient greedy Dijkstra router.
    Omniscient(OmniscientState),
    /// AODV reactive distance-vector router.
    Aodv(AodvState),
    /// BGP-lite path-vector router.
    BgpLite(BgpLiteState),
}

impl MediumKind {
    fn for_algorithm(algorithm: Algorithm, id: MediumId, rng: &mut StdRng) -> Self {
        match algorithm {
            Algorithm::Flooding => MediumKind::Flooding(FloodingState::new()),
            Algorithm::Omniscient => MediumKind::Omniscient(OmniscientState::new()),
            Algorithm::Aodv => MediumKind::Aodv(AodvState::new(id, rng)),
            Algorithm::BgpLite => MediumKind::BgpLite(BgpLiteState::new(rng)),
        }
    }
}

/// A generic transport element: models either a host/router or a physical link.
#[derive(Debug)]
pub struct Medium {
    /// Unique id of this medium, and its index into the simulation's arena.
    pub id: MediumId,
    /// Number of concurrent service slots.
    pub pathways: usize,
    /// Fixed per-packet service cost, expressed in the same units as `byte_rate`.
    pub overhead: u64,
    /// Mean service rate (bytes per tick) before stochastic perturbation.
    pub byte_rate: f64,
    /// Mean per-traversal loss probability before stochastic perturbation, in `[0, 1]`.
    pub drop_rate: f64,
    /// Whether this medium is currently able to make progress. Toggled by scenarios.
    pub operational: bool,
    /// Neighbor media, in a fixed order used to break every forwarding/broadcast tie.
    pub connections: Vec<MediumId>,
    /// Packets currently occupying a pathway.
    pub in_transit: Vec<InTransit>,
    /// Precomputed, perturbed per-tick service rate.
    pub throughput: Vec<f64>,
    /// Precomputed, perturbed per-tick drop probability.
    pub drop: Vec<f64>,
    /// Whether this medium is a router (`true`) or a plain link (`false`).
    pub logic: bool,
    /// The protocol-specific behavior this medium runs.
    pub kind: MediumKind,
}

impl Medium {
    /// Construct a new medium. `throughput`/`drop` must already be the perturbed, per-tick
    /// sequences produced by the noise source (see [`crate::noise`]); they must be at least as
    /// long as the simulation's tick limit.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: MediumId,
        pathways: usize,
        overhead: u64,
        byte_rate: f64,
        drop_rate: f64,
        logic: bool,
        algorithm: Option<Algorithm>,
        throughput: Vec<f64>,
        drop: Vec<f64>,
        rng: &mut StdRng,
    ) -> Self {
        let kind = match (logic, algorithm) {
            (true, Some(algorithm)) => MediumKind::for_algorithm(algorithm, id, rng),
            _ => MediumKind::Link,
        };
        Self {
            id,
            pathways: pathways.max(1),
            overhead,
            byte_rate,
            drop_rate,
            operational: true,
            connections: Vec::new(),
            in_transit: Vec::new(),
            throughput,
            drop,
            logic,
            kind,
        }
    }

    /// A placeholder used only while the real medium is temporarily extracted from the network's
    /// arena for ticking; never observed by a scenario or a routing protocol.
    pub(crate) fn placeholder() -> Self {
        Self {
            id: MediumId(usize::MAX),
            pathways: 1,
            overhead: 0,
            byte_rate: 1.0,
            drop_rate: 0.0,
            operational: false,
            connections: Vec::new(),
            in_transit: Vec::new(),
            throughput: Vec::new(),
            drop: Vec::new(),
            logic: false,
            kind: MediumKind::Link,
        }
    }

    /// Admit `packet` if a pathway is free, otherwise delegate to [`Medium::receive_full`].
    ///
    /// For AODV, a broadcast (non-HELLO) packet is first subjected to loop-suppression: if its
    /// `(originator, broadcast_count)` identifier is not newer than the highest one seen from
    /// that originator, it is dropped silently before any capacity check.
    pub fn receive(&mut self, packet: PacketId, upstream: Sender, packets: &PacketArena) {
        if let MediumKind::Aodv(state) = &mut self.kind {
            if !state.admission_check(packets.get(packet)) {
                return;
            }
        }
        if self.in_transit.len() < self.pathways {
            self.receive_clear(packet, upstream, packets);
        } else {
            self.receive_full(packet, upstream);
        }
    }

    /// Whether a target medium can accept a send immediately: it has a free pathway, or it is a
    /// router (routers buffer unconditionally into `in` rather than reject).
    pub fn can_accept_immediately(&self) -> bool {
        self.in_transit.len() < self.pathways || self.logic
    }

    fn receive_clear(&mut self, packet: PacketId, upstream: Sender, packets: &PacketArena) {
        if let MediumKind::Flooding(state) = &mut self.kind {
            if !state.check_and_record_seen(packet) {
                return;
            }
        }
        let byte_size = packets.get(packet).byte_size as f64;
        let remaining = byte_size + self.overhead as f64 * self.byte_rate;
        self.in_transit.push(InTransit {
            packet,
            upstream,
            remaining,
        });
    }

    /// Default (link) behavior on overflow: drop the packet. Router variants buffer instead.
    fn receive_full(&mut self, packet: PacketId, upstream: Sender) {
        match &mut self.kind {
            MediumKind::Link => {
                log::debug!("{}: dropping {packet} (medium is full)", self.id);
            }
            MediumKind::Flooding(s) => s.receive_full(self.id, packet, upstream),
            MediumKind::Omniscient(s) => s.receive_full(packet, upstream),
            MediumKind::Aodv(s) => s.receive_full(self.id, packet, upstream),
            MediumKind::BgpLite(s) => s.receive_full(self.id, packet, upstream),
        }
    }

    /// Re-admit a packet taken from a router's own `in` queue back into service, honoring the
    /// same pathway/dedup rules as an external [`Medium::receive_clear`] call.
    pub(crate) fn readmit(&mut self, packet: PacketId, upstream: Sender, packets: &PacketArena) {
        self.receive_clear(packet, upstream, packets);
    }

    /// Sum of the lengths of all named queues (buffer backpressure accounting). Only data
    /// packets (empty content) count, per the "basic router substrate" rule that control traffic
    /// must not inflate backpressure metrics.
    pub fn count_buffers(&self, packets: &PacketArena) -> usize {
        match &self.kind {
            MediumKind::Link => 0,
            MediumKind::Flooding(s) => s.count_buffers(packets),
            MediumKind::Omniscient(s) => s.count_buffers(packets),
            MediumKind::Aodv(s) => s.count_buffers(packets),
            MediumKind::BgpLite(s) => s.count_buffers(packets),
        }
    }

    /// Whether every buffer this medium owns is currently empty.
    pub fn buffers_empty(&self) -> bool {
        match &self.kind {
            MediumKind::Link => true,
            MediumKind::Flooding(s) => s.is_empty(),
            MediumKind::Omniscient(s) => s.is_empty(),
            MediumKind::Aodv(s) => s.is_empty(),
            MediumKind::BgpLite(s) => s.is_empty(),
        }
    }

    /// Advance every in-flight packet by its fair share of this tick's throughput. Returns the
    /// `(packet, upstream)` pairs that finished service this tick, in their `in_transit` order,
    /// and already removed from `in_transit`. Sampling of transit loss and arrival-timestamping
    /// happens here; the caller still must invoke [`Medium::process`] for each returned pair.
    pub fn advance_in_transit(
        &mut self,
        t: Tick,
        packets: &mut PacketArena,
        rng: &mut StdRng,
    ) -> Vec<(PacketId, Sender)> {
        if !self.operational || self.in_transit.is_empty() {
            return Vec::new();
        }
        let share = self.throughput[t as usize] / self.in_transit.len() as f64;
        let mut ready = Vec::new();
        let mut still_pending = Vec::with_capacity(self.in_transit.len());
        for mut entry in std::mem::take(&mut self.in_transit) {
            entry.remaining -= share;
            if entry.remaining <= 0.0 {
                ready.push(entry);
            } else {
                still_pending.push(entry);
            }
        }
        self.in_transit = still_pending;

        let drop_prob = self.drop[t as usize].clamp(0.0, 1.0);
        let mut outcome = Vec::with_capacity(ready.len());
        for entry in ready {
            let pkt = packets.get(entry.packet);
            let is_data = !pkt.is_control();
            let dest = pkt.dest;
            if is_data && rng.gen_bool(drop_prob) {
                log::debug!("{}: dropping {} (transit loss)", self.id, entry.packet);
                packets.get_mut(entry.packet).time_arrived = -1;
                continue;
            }
            if dest == self.id.0 as i64 {
                packets.get_mut(entry.packet).time_arrived = t as i64;
            }
            outcome.push((entry.packet, entry.upstream));
        }
        outcome
    }

    /// Hand a packet that just finished service to the protocol-specific processing step.
    pub fn process(
        &mut self,
        packet: PacketId,
        upstream: Sender,
        t: Tick,
        packets: &mut PacketArena,
    ) -> Vec<PendingSend> {
        match &mut self.kind {
            MediumKind::Link => self
                .connections
                .iter()
                .filter(|&&c| Some(c) != upstream.medium)
                .map(|&target| PendingSend { target, packet })
                .collect(),
            MediumKind::Flooding(_) => flooding::process(self, packet, upstream, packets),
            MediumKind::Omniscient(_) => omniscient::process(self, packet, packets),
            MediumKind::Aodv(_) => aodv::process(self, packet, upstream, t, packets),
            MediumKind::BgpLite(_) => bgplite::process(self, packet, upstream, packets),
        }
    }

    /// Per-tick router responsibilities beyond reacting to a just-arrived packet: hello/keepalive
    /// emission, queue retries, timeout expiry, advertisement flushing.
    pub fn periodic_tick(&mut self, t: Tick, packets: &mut PacketArena) -> Vec<PendingSend> {
        match &mut self.kind {
            MediumKind::Link => Vec::new(),
            MediumKind::Flooding(_) => flooding::periodic_tick(self, packets),
            MediumKind::Omniscient(_) => omniscient::periodic_tick(self, packets),
            MediumKind::Aodv(_) => aodv::periodic_tick(self, t, packets),
            MediumKind::BgpLite(_) => bgplite::periodic_tick(self, t, packets),
        }
    }

    /// Create a control packet, own it in the arena, and return its id.
    pub(crate) fn emit_control(
        &self,
        packets: &mut PacketArena,
        dest: i64,
        content: impl Into<String>,
    ) -> PacketId {
        packets.insert(Packet::control(self.id.0 as i64, dest, content))
    }

    /// Give up on delivering `packet`: mark it never arrived and log why. Used when a router has
    /// no way to forward a packet and, unlike a queue-full drop, must not retry later.
    pub(crate) fn drop_packet(&self, packets: &mut PacketArena, packet: PacketId, reason: &str) {
        log::debug!("{}: dropping {packet} ({reason})", self.id);
        packets.get_mut(packet).time_arrived = -1;
    }

    /// Stage `(target, packet)` into this medium's own `out` buffer because `target` could not
    /// accept it immediately. No-op for plain links, which have no `out` buffer.
    pub fn stage_out(&mut self, target: MediumId, packet: PacketId) {
        match &mut self.kind {
            MediumKind::Link => {
                log::debug!("{}: dropping {packet} (medium is full)", self.id);
            }
            MediumKind::Flooding(_) => flooding::stage_out(self, target, packet),
            MediumKind::Omniscient(_) => omniscient::stage_out(self, target, packet),
            MediumKind::Aodv(_) => aodv::stage_out(self, target, packet),
            MediumKind::BgpLite(_) => bgplite::stage_out(self, target, packet),
        }
    }

    /// Broadcast a control packet to every connection (used for HELLO/RREQ/RREP/RERR/KEEPALIVE).
    pub(crate) fn broadcast(
        &self,
        packets: &mut PacketArena,
        content: impl Into<String>,
    ) -> (PacketId, Vec<PendingSend>) {
        let packet = self.emit_control(packets, BROADCAST, content);
        let sends = self
            .connections
            .iter()
            .map(|&target| PendingSend { target, packet })
            .collect();
        (packet, sends)
    }
}

/// Push `item` onto `queue` if it has room, otherwise log a drop with `reason` and return
/// `false`. Shared by every router variant's bounded queues.
pub(crate) fn push_capped<T>(
    id: MediumId,
    packet: PacketId,
    queue: &mut VecDeque<T>,
    item: T,
    cap: usize,
    reason: &str,
) -> bool {
    if queue.len() < cap {
        queue.push_back(item);
        true
    } else {
        log::debug!("{id}: dropping {packet} ({reason})");
        false
    }
}
