//! AODV-style reactive distance-vector routing: neighbors are discovered via periodic HELLOs,
//! routes are discovered on demand via flooded RREQ/RREP, and broken links are announced with
//! RERR. Every broadcast (HELLO excluded) carries an `(originator, broadcast_count)` identifier
//! used for flood loop-suppression.

use super::{push_capped, Medium, PendingSend, Sender, BUFFER_CAP};
use crate::packet::{Packet, PacketArena};
use crate::types::{MediumId, PacketId, Tick};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{BTreeMap, VecDeque};

const HELLO_WINDOW: usize = 20;
const POLL_FREQUENCY: f64 = 0.01;

#[derive(Debug, Clone, Copy)]
struct RouteEntry {
    last_seen: i64,
    sequence: i64,
    next_hop: Option<i64>,
    distance: i64,
}

#[derive(Debug, Clone, Copy)]
struct NeighborEntry {
    last_seen: Tick,
    via: MediumId,
}

#[derive(Debug)]
pub struct AodvState {
    routes: BTreeMap<i64, RouteEntry>,
    neighbors: BTreeMap<i64, NeighborEntry>,
    broadcasts: BTreeMap<i64, u64>,
    sequence_count: i64,
    broadcast_count: u64,
    hello_timeout: i64,
    route_timeout: i64,
    hello_delays: VecDeque<i64>,
    last_hello_sent: i64,
    buf_in: VecDeque<(PacketId, Sender)>,
    buf_out: VecDeque<(MediumId, PacketId)>,
    route_pending: VecDeque<(PacketId, Sender)>,
}

enum Msg {
    Hello,
    Rreq { dest: i64, sequence: i64, bc: u64 },
    Rrep { target: i64, sequence: i64, distance: i64, bc: u64 },
    Rerr { dead: Vec<i64>, bc: u64 },
    Data,
}

fn parse(content: &str) -> Msg {
    if content == "HELLO" {
        return Msg::Hello;
    }
    if content.is_empty() {
        return Msg::Data;
    }
    let mut parts = content.splitn(3, ':');
    let tag = parts.next().unwrap_or_default();
    let body = parts.next().unwrap_or_default();
    let bc: u64 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    match tag {
        "RREQ" => {
            let mut f = body.split(',');
            let dest = f.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let sequence = f.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            Msg::Rreq { dest, sequence, bc }
        }
        "RREP" => {
            let mut f = body.split(',');
            let target = f.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let sequence = f.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let _next_hop_in_payload: i64 = f.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let distance = f.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            Msg::Rrep { target, sequence, distance, bc }
        }
        "RERR" => {
            let dead = body.split(',').filter_map(|s| s.parse().ok()).collect();
            Msg::Rerr { dead, bc }
        }
        _ => Msg::Data,
    }
}

impl AodvState {
    pub fn new(id: MediumId, rng: &mut StdRng) -> Self {
        let mut routes = BTreeMap::new();
        routes.insert(
            id.0 as i64,
            RouteEntry { last_seen: -1, sequence: 0, next_hop: None, distance: 0 },
        );
        // Jittered startup so every router's first HELLO doesn't land on the same tick.
        let jitter = rng.gen_range(0..10);
        let route_jitter = rng.gen_range(-100..100);
        Self {
            routes,
            neighbors: BTreeMap::new(),
            broadcasts: BTreeMap::new(),
            sequence_count: 0,
            broadcast_count: 0,
            hello_timeout: 100 + jitter,
            route_timeout: 1000 + route_jitter,
            hello_delays: VecDeque::new(),
            last_hello_sent: -(jitter),
            buf_in: VecDeque::new(),
            buf_out: VecDeque::new(),
            route_pending: VecDeque::new(),
        }
    }

    /// Flood loop-suppression: drop (return `false`) any non-HELLO broadcast whose
    /// `(originator, broadcast_count)` is not newer than the highest seen from that originator.
    pub(crate) fn admission_check(&mut self, packet: &Packet) -> bool {
        if !packet.is_broadcast() || packet.content == "HELLO" {
            return true;
        }
        let bc = match packet.content.rsplit(':').next().and_then(|s| s.parse::<u64>().ok()) {
            Some(bc) => bc,
            None => return true,
        };
        let highest = self.broadcasts.get(&packet.source).copied().unwrap_or(0);
        if bc <= highest {
            return false;
        }
        self.broadcasts.insert(packet.source, bc);
        true
    }

    pub(crate) fn receive_full(&mut self, id: MediumId, packet: PacketId, upstream: Sender) {
        push_capped(id, packet, &mut self.buf_in, (packet, upstream), BUFFER_CAP, "in queue full");
    }

    pub(crate) fn count_buffers(&self, packets: &PacketArena) -> usize {
        [&self.buf_in, &self.route_pending]
            .iter()
            .map(|q| q.iter().filter(|(p, _)| !packets.get(*p).is_control()).count())
            .sum::<usize>()
            + self.buf_out.iter().filter(|(_, p)| !packets.get(*p).is_control()).count()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf_in.is_empty() && self.buf_out.is_empty() && self.route_pending.is_empty()
    }

    fn next_sequence(&mut self) -> i64 {
        self.sequence_count += 1;
        self.sequence_count
    }

    fn next_broadcast(&mut self, id: MediumId) -> u64 {
        self.broadcast_count += 1;
        self.broadcasts.insert(id.0 as i64, self.broadcast_count);
        self.broadcast_count
    }

    fn link_for(&self, neighbor: i64) -> Option<MediumId> {
        self.neighbors.get(&neighbor).map(|n| n.via)
    }
}

fn state_mut(medium: &mut Medium) -> &mut AodvState {
    match &mut medium.kind {
        super::MediumKind::Aodv(s) => s,
        _ => unreachable!("aodv::state_mut called on a non-aodv medium"),
    }
}

fn state(medium: &Medium) -> &AodvState {
    match &medium.kind {
        super::MediumKind::Aodv(s) => s,
        _ => unreachable!("aodv::state called on a non-aodv medium"),
    }
}

/// Dispatch a just-arrived packet by its parsed control tag.
pub(crate) fn process(
    medium: &mut Medium,
    packet: PacketId,
    upstream: Sender,
    t: Tick,
    packets: &mut PacketArena,
) -> Vec<PendingSend> {
    let content = packets.get(packet).content.clone();
    match parse(&content) {
        Msg::Hello => handle_hello(medium, packet, upstream, t, packets),
        Msg::Rreq { dest, sequence, bc } => handle_rreq(medium, packet, upstream, dest, sequence, bc, packets),
        Msg::Rrep { target, sequence, distance, bc } => {
            handle_rrep(medium, packet, upstream, target, sequence, distance, bc, packets)
        }
        Msg::Rerr { dead, bc } => handle_rerr(medium, packet, upstream, dead, bc, packets),
        Msg::Data => handle_data(medium, packet, upstream, t, packets),
    }
}

fn handle_hello(
    medium: &mut Medium,
    packet: PacketId,
    upstream: Sender,
    t: Tick,
    packets: &mut PacketArena,
) -> Vec<PendingSend> {
    let src = packets.get(packet).source;
    let time_sent = packets.get(packet).time_sent;
    let Some(via) = upstream.medium else { return Vec::new() };
    let state = state_mut(medium);
    state.neighbors.insert(src, NeighborEntry { last_seen: t, via });
    state.routes.insert(src, RouteEntry { last_seen: t as i64, sequence: 0, next_hop: Some(src), distance: 1 });

    let delay = (t as i64 - time_sent).max(0);
    state.hello_delays.push_back(delay);
    if state.hello_delays.len() > HELLO_WINDOW {
        state.hello_delays.pop_front();
    }
    let sum: i64 = state.hello_delays.iter().sum();
    let n = state.hello_delays.len() as f64;
    let recompute = ((sum as f64 + n) / n).ceil() as i64 + 10;
    state.hello_timeout = (recompute as f64 / POLL_FREQUENCY) as i64;
    Vec::new()
}

fn handle_rreq(
    medium: &mut Medium,
    packet: PacketId,
    upstream: Sender,
    dest: i64,
    sequence: i64,
    _bc: u64,
    packets: &mut PacketArena,
) -> Vec<PendingSend> {
    let self_id = medium.id.0 as i64;
    if dest == self_id {
        let seq = {
            let state = state_mut(medium);
            let new_seq = state.sequence_count.max(sequence) + 1;
            state.sequence_count = new_seq;
            new_seq
        };
        let upstream_router = match upstream.router {
            Some(r) => r,
            None => return Vec::new(),
        };
        let content = format!("RREP:{self_id},{seq},{self_id},1:{}", state_mut(medium).broadcast_count);
        let reply = medium.emit_control(packets, upstream_router, content);
        return match upstream.medium {
            Some(target) => vec![PendingSend { target, packet: reply }],
            None => Vec::new(),
        };
    }
    let cached = state(medium).routes.get(&dest).copied();
    if let Some(entry) = cached {
        if sequence > entry.sequence {
            let upstream_router = match upstream.router {
                Some(r) => r,
                None => return Vec::new(),
            };
            let content =
                format!("RREP:{dest},{},{self_id},{}:{}", entry.sequence, entry.distance + 1, state_mut(medium).broadcast_count);
            let reply = medium.emit_control(packets, upstream_router, content);
            return match upstream.medium {
                Some(target) => vec![PendingSend { target, packet: reply }],
                None => Vec::new(),
            };
        }
    }
    medium
        .connections
        .iter()
        .filter(|&&c| Some(c) != upstream.medium)
        .map(|&target| PendingSend { target, packet })
        .collect()
}

fn handle_rrep(
    medium: &mut Medium,
    packet: PacketId,
    upstream: Sender,
    target: i64,
    sequence: i64,
    distance: i64,
    _bc: u64,
    packets: &mut PacketArena,
) -> Vec<PendingSend> {
    let Some(upstream_router) = upstream.router else { return Vec::new() };
    let t = packets.get(packet).time_arrived.max(packets.get(packet).time_sent);
    let accept = {
        let state = state_mut(medium);
        let newer = match state.routes.get(&target) {
            Some(existing) => {
                sequence > existing.sequence || (sequence == existing.sequence && distance < existing.distance)
            }
            None => true,
        };
        if newer {
            state.routes.insert(
                target,
                RouteEntry { last_seen: t, sequence, next_hop: Some(upstream_router), distance },
            );
        }
        newer
    };
    if !accept {
        return Vec::new();
    }
    // Carry the reply further toward the original requester, except back the way it came.
    medium
        .connections
        .iter()
        .filter(|&&c| Some(c) != upstream.medium)
        .map(|&out| PendingSend { target: out, packet })
        .collect()
}

fn handle_rerr(
    medium: &mut Medium,
    packet: PacketId,
    upstream: Sender,
    dead: Vec<i64>,
    _bc: u64,
    packets: &mut PacketArena,
) -> Vec<PendingSend> {
    let removed: Vec<i64> = {
        let state = state_mut(medium);
        dead.iter()
            .filter(|d| state.routes.remove(d).is_some())
            .copied()
            .collect()
    };
    if removed.is_empty() {
        return Vec::new();
    }
    let id = medium.id;
    let bc = state_mut(medium).next_broadcast(id);
    let list = removed.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",");
    let content = format!("RERR:{list}:{bc}");
    let (new_packet, _) = medium.broadcast(packets, content);
    let _ = packet;
    medium
        .connections
        .iter()
        .filter(|&&c| Some(c) != upstream.medium)
        .map(|&target| PendingSend { target, packet: new_packet })
        .collect()
}

fn handle_data(
    medium: &mut Medium,
    packet: PacketId,
    upstream: Sender,
    _t: Tick,
    packets: &mut PacketArena,
) -> Vec<PendingSend> {
    let self_id = medium.id.0 as i64;
    let dest = packets.get(packet).dest;
    if dest == self_id {
        return Vec::new();
    }
    let route = state(medium).routes.get(&dest).copied();
    match route.and_then(|r| r.next_hop) {
        Some(next_hop) => match state(medium).link_for(next_hop) {
            Some(link) => vec![PendingSend { target: link, packet }],
            None => {
                medium.drop_packet(packets, packet, "missing neighbor");
                Vec::new()
            }
        },
        None => request_route(medium, packet, upstream, dest, packets),
    }
}

/// Park a data packet awaiting a route and ask for one: broadcast an RREQ if this router
/// originated the packet, or an RERR back toward the origin if it was only relaying.
fn request_route(
    medium: &mut Medium,
    packet: PacketId,
    upstream: Sender,
    dest: i64,
    packets: &mut PacketArena,
) -> Vec<PendingSend> {
    push_capped(
        medium.id,
        packet,
        &mut state_mut(medium).route_pending,
        (packet, upstream),
        BUFFER_CAP,
        "route pending queue full",
    );
    let id = medium.id;
    if upstream.router.is_none() {
        let seq = state_mut(medium).next_sequence();
        let bc = state_mut(medium).next_broadcast(id);
        let content = format!("RREQ:{dest},{seq}:{bc}");
        let (_, sends) = medium.broadcast(packets, content);
        sends
    } else {
        let bc = state_mut(medium).next_broadcast(id);
        let content = format!("RERR:{dest}:{bc}");
        let (_, sends) = medium.broadcast(packets, content);
        sends
    }
}

pub(crate) fn periodic_tick(medium: &mut Medium, t: Tick, packets: &mut PacketArena) -> Vec<PendingSend> {
    let mut sends = Vec::new();

    // 1. Retry anything waiting on a now-resolved route.
    let pending: Vec<_> = state_mut(medium).route_pending.drain(..).collect();
    for (packet, upstream) in pending {
        let dest = packets.get(packet).dest;
        match state(medium).routes.get(&dest).and_then(|r| r.next_hop).and_then(|n| state(medium).link_for(n)) {
            Some(link) => sends.push(PendingSend { target: link, packet }),
            None => {
                let _ = push_capped(
                    medium.id,
                    packet,
                    &mut state_mut(medium).route_pending,
                    (packet, upstream),
                    BUFFER_CAP,
                    "route pending queue full",
                );
            }
        }
    }

    // 2. Re-admit the head of `in` if a pathway is free.
    if medium.in_transit.len() < medium.pathways {
        let head = state_mut(medium).buf_in.pop_front();
        if let Some((packet, upstream)) = head {
            medium.readmit(packet, upstream, packets);
        }
    }

    // 3. Drain `out`.
    let out: Vec<_> = state_mut(medium).buf_out.drain(..).collect();
    sends.extend(out.into_iter().map(|(target, packet)| PendingSend { target, packet }));

    // 4. Emit a HELLO if the interval has elapsed.
    let due = {
        let state = state(medium);
        (t as i64 - state.last_hello_sent) >= state.hello_timeout / 3
    };
    if due {
        state_mut(medium).last_hello_sent = t as i64;
        let (_, hello_sends) = medium.broadcast(packets, "HELLO");
        sends.extend(hello_sends);
    }

    // 5. Expire stale neighbors, drop their direct routes, and announce the loss with an RERR.
    let stale: Vec<i64> = state(medium)
        .neighbors
        .iter()
        .filter(|(_, n)| (t as i64 - n.last_seen as i64) > state(medium).hello_timeout)
        .map(|(&id, _)| id)
        .collect();
    for id in &stale {
        state_mut(medium).neighbors.remove(id);
    }
    let neighbor_routes_lost: Vec<i64> =
        stale.iter().filter(|id| state(medium).routes.contains_key(id)).copied().collect();
    for dest in &neighbor_routes_lost {
        state_mut(medium).routes.remove(dest);
    }
    if !neighbor_routes_lost.is_empty() {
        let id = medium.id;
        let bc = state_mut(medium).next_broadcast(id);
        let list = neighbor_routes_lost.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",");
        let content = format!("RERR:{list}:{bc}");
        let (_, rerr_sends) = medium.broadcast(packets, content);
        sends.extend(rerr_sends);
    }

    // 6. Expire stale routes (independent of neighbor expiry, using route_timeout) and announce.
    let expired_routes: Vec<i64> = state(medium)
        .routes
        .iter()
        .filter(|(&dest, r)| dest != medium.id.0 as i64 && r.last_seen >= 0 && (t as i64 - r.last_seen) > state(medium).route_timeout)
        .map(|(&dest, _)| dest)
        .collect();
    for dest in &expired_routes {
        state_mut(medium).routes.remove(dest);
    }
    if !expired_routes.is_empty() {
        let id = medium.id;
        let bc = state_mut(medium).next_broadcast(id);
        let list = expired_routes.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(",");
        let content = format!("RERR:{list}:{bc}");
        let (_, rerr_sends) = medium.broadcast(packets, content);
        sends.extend(rerr_sends);
    }

    sends
}

pub(crate) fn stage_out(medium: &mut Medium, target: MediumId, packet: PacketId) {
    let id = medium.id;
    let state = state_mut(medium);
    push_capped(id, packet, &mut state.buf_out, (target, packet), BUFFER_CAP, "out queue full");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wire_format_roundtrips() {
        match parse("RREQ:7,3:1") {
            Msg::Rreq { dest, sequence, bc } => {
                assert_eq!(dest, 7);
                assert_eq!(sequence, 3);
                assert_eq!(bc, 1);
            }
            _ => panic!("expected RREQ"),
        }
        match parse("RREP:7,3,7,1:2") {
            Msg::Rrep { target, sequence, distance, bc } => {
                assert_eq!(target, 7);
                assert_eq!(sequence, 3);
                assert_eq!(distance, 1);
                assert_eq!(bc, 2);
            }
            _ => panic!("expected RREP"),
        }
        match parse("RERR:3,4:5") {
            Msg::Rerr { dead, bc } => {
                assert_eq!(dead, vec![3, 4]);
                assert_eq!(bc, 5);
            }
            _ => panic!("expected RERR"),
        }
        assert!(matches!(parse("HELLO"), Msg::Hello));
        assert!(matches!(parse(""), Msg::Data));
    }

    use rand::SeedableRng;

    fn aodv_medium(id: usize) -> Medium {
        let mut rng = StdRng::seed_from_u64(id as u64);
        Medium::new(
            MediumId(id),
            4,
            1,
            100.0,
            0.0,
            true,
            Some(crate::types::Algorithm::Aodv),
            vec![100.0; 10],
            vec![0.0; 10],
            &mut rng,
        )
    }

    #[test]
    fn missing_neighbor_drops_the_packet_without_rediscovery() {
        let mut medium = aodv_medium(5);
        state_mut(&mut medium).routes.insert(42, RouteEntry { last_seen: 0, sequence: 1, next_hop: Some(7), distance: 1 });
        let mut packets = PacketArena::new();
        let packet = packets.insert(Packet::data(1, 42, 64));
        let upstream = Sender { medium: Some(MediumId(0)), router: Some(1) };

        let sends = handle_data(&mut medium, packet, upstream, 0, &mut packets);

        assert!(sends.is_empty());
        assert_eq!(packets.get(packet).time_arrived, -1);
        assert!(state(&medium).routes.contains_key(&42), "a missing link should not clear the cached route");
    }

    #[test]
    fn self_originated_data_with_no_route_issues_rreq() {
        let mut medium = aodv_medium(5);
        medium.connections = vec![MediumId(0), MediumId(1)];
        let mut packets = PacketArena::new();
        let packet = packets.insert(Packet::data(5, 42, 64));

        let sends = handle_data(&mut medium, packet, Sender::default(), 0, &mut packets);

        assert!(!sends.is_empty());
        for send in &sends {
            assert!(packets.get(send.packet).content.starts_with("RREQ:"));
        }
    }

    #[test]
    fn relayed_data_with_no_route_issues_rerr_instead_of_rediscovery() {
        let mut medium = aodv_medium(5);
        medium.connections = vec![MediumId(0), MediumId(1)];
        let mut packets = PacketArena::new();
        let packet = packets.insert(Packet::data(1, 42, 64));
        let upstream = Sender { medium: Some(MediumId(0)), router: Some(1) };

        let sends = handle_data(&mut medium, packet, upstream, 0, &mut packets);

        assert!(!sends.is_empty());
        for send in &sends {
            assert!(packets.get(send.packet).content.starts_with("RERR:"));
        }
    }
}
