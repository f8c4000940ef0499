//! Omniscient router: no persistent routing state, recomputes a fresh shortest path for every
//! packet using full, instantaneous visibility of every other medium. The theoretical upper bound
//! every reactive or path-vector protocol is measured against.

use super::{push_capped, Medium, PendingSend, Sender, BUFFER_CAP};
use crate::packet::PacketArena;
use crate::types::MediumId;
use crate::types::PacketId;
use std::collections::{BinaryHeap, VecDeque};

#[derive(Debug, Default)]
pub struct OmniscientState {
    buf_in: VecDeque<(PacketId, Sender)>,
    buf_out: VecDeque<(MediumId, PacketId)>,
}

impl OmniscientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn receive_full(&mut self, packet: PacketId, upstream: Sender) {
        self.buf_in.push_back((packet, upstream));
    }

    pub(crate) fn count_buffers(&self, packets: &PacketArena) -> usize {
        let data_in = self.buf_in.iter().filter(|(p, _)| !packets.get(*p).is_control()).count();
        let data_out = self.buf_out.iter().filter(|(_, p)| !packets.get(*p).is_control()).count();
        data_in + data_out
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf_in.is_empty() && self.buf_out.is_empty()
    }
}

fn state_mut(medium: &mut Medium) -> &mut OmniscientState {
    match &mut medium.kind {
        super::MediumKind::Omniscient(s) => s,
        _ => unreachable!("omniscient::state_mut called on a non-omniscient medium"),
    }
}

#[derive(PartialEq)]
struct HeapEntry(f64, MediumId);

impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.0.partial_cmp(&self.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Edge cost of crossing `medium` with `packet`: the service time the packet would see given the
/// medium's current congestion (in-flight packets plus everything parked in its buffers), so
/// Dijkstra naturally prefers a fast, currently-idle path over a loaded one.
fn edge_cost(medium: &Medium, packets: &PacketArena, packet: PacketId) -> f64 {
    let byte_size = packets.get(packet).byte_size as f64;
    let contending = medium.in_transit.len() + medium.count_buffers(packets) + 1;
    let share = medium.byte_rate / contending as f64;
    (byte_size / share.max(1e-6)).ceil() + medium.overhead as f64
}

/// Run Dijkstra over every medium (routers and links alike, since links themselves carry the edge
/// cost), starting from `origin`, and return the first hop toward `dest`.
///
/// `origin` is passed separately from `media` because the caller ticks one medium at a time by
/// temporarily replacing its arena slot with a placeholder; `origin` carries the real connections
/// for that slot, while every other node's connections are read out of `media`.
fn next_hop(origin: &Medium, media: &[Medium], dest: MediumId, packet: PacketId, packets: &PacketArena) -> Option<MediumId> {
    let from = origin.id;
    if from == dest {
        return None;
    }
    let mut dist = vec![f64::INFINITY; media.len()];
    let mut first_hop: Vec<Option<MediumId>> = vec![None; media.len()];
    let mut heap = BinaryHeap::new();
    dist[from.0] = 0.0;
    heap.push(HeapEntry(0.0, from));

    while let Some(HeapEntry(d, u)) = heap.pop() {
        if d > dist[u.0] {
            continue;
        }
        if u == dest {
            break;
        }
        let connections = if u == from { &origin.connections } else { &media[u.0].connections };
        for &v in connections {
            let cost = edge_cost(&media[v.0], packets, packet);
            let nd = d + cost;
            if nd < dist[v.0] {
                dist[v.0] = nd;
                first_hop[v.0] = Some(if u == from { v } else { first_hop[u.0].unwrap_or(v) });
                heap.push(HeapEntry(nd, v));
            }
        }
    }
    first_hop[dest.0]
}

/// Forward toward `dest` along the current shortest path, recomputed from scratch using full
/// network visibility. `media` is the network's arena with the currently-ticked medium's slot
/// temporarily holding a placeholder; that is harmless here since the path only needs connection
/// topology and edge weights, both unaffected by in-flight packet state.
pub(crate) fn process_with_media(
    medium: &Medium,
    media: &[Medium],
    packet: PacketId,
    packets: &PacketArena,
) -> Vec<PendingSend> {
    let dest_int = packets.get(packet).dest;
    if dest_int == medium.id.0 as i64 || dest_int < 0 {
        return Vec::new();
    }
    let dest = MediumId(dest_int as usize);
    match next_hop(medium, media, dest, packet, packets) {
        Some(target) => vec![PendingSend { target, packet }],
        None => {
            log::debug!("{}: dropping {packet} (no route to {dest_int})", medium.id);
            Vec::new()
        }
    }
}

/// Omniscient routing needs the full media arena, which [`Medium::process`] does not have access
/// to; [`crate::network::Network`] calls [`process_with_media`] directly for this variant instead
/// of going through [`Medium::process`]. This stub exists only so the dispatch table in
/// `Medium::process` stays total; it is never reached in practice.
pub(crate) fn process(medium: &mut Medium, packet: PacketId, packets: &mut PacketArena) -> Vec<PendingSend> {
    log::debug!(
        "{}: omniscient routing for {packet} must go through process_with_media",
        medium.id
    );
    let _ = packets;
    Vec::new()
}

/// Retry anything parked in `buf_in` (pathway contention on receive) and drain `buf_out`. Unlike
/// the reactive protocols, omniscient routing recomputes the path fresh for every retry, so
/// `buf_in` holds raw `(packet, upstream)` pairs rather than a precomputed route.
pub(crate) fn drain_buffers(medium: &mut Medium, packets: &mut PacketArena) -> Vec<(PacketId, Sender)> {
    let state = state_mut(medium);
    let retries: Vec<_> = state.buf_in.drain(..).collect();
    for &(packet, upstream) in &retries {
        medium.readmit(packet, upstream, packets);
    }
    Vec::new()
}

pub(crate) fn periodic_tick(medium: &mut Medium, packets: &mut PacketArena) -> Vec<PendingSend> {
    drain_buffers(medium, packets);
    let pending: Vec<_> = state_mut(medium).buf_out.drain(..).collect();
    pending
        .into_iter()
        .map(|(target, packet)| PendingSend { target, packet })
        .collect()
}

pub(crate) fn stage_out(medium: &mut Medium, target: MediumId, packet: PacketId) {
    let id = medium.id;
    let state = state_mut(medium);
    push_capped(id, packet, &mut state.buf_out, (target, packet), BUFFER_CAP * 1000, "out queue full");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::medium::InTransit;
    use crate::packet::Packet;
    use crate::types::Algorithm;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn flat_medium(id: usize) -> Medium {
        let mut rng = StdRng::seed_from_u64(id as u64);
        Medium::new(MediumId(id), 4, 1, 100.0, 0.0, true, Some(Algorithm::Omniscient), vec![100.0; 10], vec![0.0; 10], &mut rng)
    }

    #[test]
    fn edge_cost_grows_with_congestion() {
        let mut packets = PacketArena::new();
        let packet = packets.insert(Packet::data(0, 1, 100));

        let idle = flat_medium(0);
        let idle_cost = edge_cost(&idle, &packets, packet);

        let mut busy = flat_medium(0);
        busy.in_transit = vec![
            InTransit { packet, upstream: Sender::default(), remaining: 10.0 },
            InTransit { packet, upstream: Sender::default(), remaining: 10.0 },
        ];
        let busy_cost = edge_cost(&busy, &packets, packet);

        assert!(busy_cost > idle_cost, "a congested medium should cost more to cross than an idle one");
    }

    #[test]
    fn next_hop_routes_around_a_congested_neighbor() {
        // origin(0) connects to dest(2) via two equal-length one-hop neighbors, a(1) and b(3).
        let mut packets = PacketArena::new();
        let packet = packets.insert(Packet::data(0, 2, 100));

        let mut origin = flat_medium(0);
        let mut a = flat_medium(1);
        let mut dest = flat_medium(2);
        let mut b = flat_medium(3);
        origin.connections = vec![MediumId(1), MediumId(3)];
        a.connections = vec![MediumId(0), MediumId(2)];
        dest.connections = vec![MediumId(1), MediumId(3)];
        b.connections = vec![MediumId(0), MediumId(2)];

        // Congest `a` so that `b` becomes the cheaper of the two equal-length paths.
        a.in_transit = vec![
            InTransit { packet, upstream: Sender::default(), remaining: 10.0 },
            InTransit { packet, upstream: Sender::default(), remaining: 10.0 },
            InTransit { packet, upstream: Sender::default(), remaining: 10.0 },
        ];

        let media = vec![origin, a, dest, b];
        let chosen = next_hop(&media[0], &media, MediumId(2), packet, &packets);

        assert_eq!(chosen, Some(MediumId(3)), "Dijkstra should prefer the less congested neighbor");
    }
}
