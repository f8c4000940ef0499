//! Simplified path-vector routing ("BGP-lite"): neighbors are discovered via KEEPALIVE, and
//! reachability propagates as explicit ordered paths via incremental UPDATE announcements and
//! withdrawals, mirroring eBGP's path-vector loop-freedom property without any policy layer.

use super::{push_capped, Medium, PendingSend, Sender, BUFFER_CAP};
use crate::packet::PacketArena;
use crate::types::{MediumId, PacketId, Tick};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Ticks a neighbor's keepalive counter is reset to on receipt; also governs send cadence
/// (`timeout / 4` for keepalives, `timeout / 10` for advertisement flushing). The spec leaves the
/// initial value unspecified (unlike AODV's explicit jittered formula); a fixed constant is used
/// here, recorded as an open-question decision.
const TIMEOUT: i64 = 100;

#[derive(Debug)]
pub struct BgpLiteState {
    routes: BTreeMap<i64, Vec<Vec<i64>>>,
    advertised: HashSet<Vec<i64>>,
    to_advertise: VecDeque<(Vec<i64>, bool)>,
    links: BTreeMap<i64, MediumId>,
    keepalive_counters: BTreeMap<i64, i64>,
    tie_break: StdRng,
    buf_in: VecDeque<(PacketId, Sender)>,
    buf_out: VecDeque<(MediumId, PacketId)>,
    buf_routing: VecDeque<(PacketId, Sender)>,
}

impl BgpLiteState {
    pub fn new(rng: &mut StdRng) -> Self {
        Self {
            routes: BTreeMap::new(),
            advertised: HashSet::new(),
            to_advertise: VecDeque::new(),
            links: BTreeMap::new(),
            keepalive_counters: BTreeMap::new(),
            tie_break: StdRng::seed_from_u64(rng.gen()),
            buf_in: VecDeque::new(),
            buf_out: VecDeque::new(),
            buf_routing: VecDeque::new(),
        }
    }

    pub(crate) fn receive_full(&mut self, id: MediumId, packet: PacketId, upstream: Sender) {
        push_capped(id, packet, &mut self.buf_in, (packet, upstream), BUFFER_CAP, "in queue full");
    }

    pub(crate) fn count_buffers(&self, packets: &PacketArena) -> usize {
        [&self.buf_in, &self.buf_routing]
            .iter()
            .map(|q| q.iter().filter(|(p, _)| !packets.get(*p).is_control()).count())
            .sum::<usize>()
            + self.buf_out.iter().filter(|(_, p)| !packets.get(*p).is_control()).count()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf_in.is_empty() && self.buf_out.is_empty() && self.buf_routing.is_empty()
    }

    fn stage(&mut self, id: MediumId, entry: (Vec<i64>, bool)) {
        if self.to_advertise.len() >= BUFFER_CAP {
            log::debug!("{id}: dropping advertisement (advertise queue full)");
            return;
        }
        self.to_advertise.push_back(entry);
    }
}

fn state_mut(medium: &mut Medium) -> &mut BgpLiteState {
    match &mut medium.kind {
        super::MediumKind::BgpLite(s) => s,
        _ => unreachable!("bgplite::state_mut called on a non-bgplite medium"),
    }
}

fn state(medium: &Medium) -> &BgpLiteState {
    match &medium.kind {
        super::MediumKind::BgpLite(s) => s,
        _ => unreachable!("bgplite::state called on a non-bgplite medium"),
    }
}

fn encode_path(path: &[i64]) -> String {
    path.iter().map(|h| h.to_string()).collect::<Vec<_>>().join("-")
}

fn decode_path(s: &str) -> Vec<i64> {
    s.split('-').filter_map(|x| x.parse().ok()).collect()
}

fn encode_update(entries: &[(Vec<i64>, bool)]) -> String {
    let body = entries
        .iter()
        .map(|(path, sign)| format!("{}:{}", if *sign { '+' } else { '-' }, encode_path(path)))
        .collect::<Vec<_>>()
        .join(";");
    format!("UPDATE:{body}")
}

fn decode_update(body: &str) -> Vec<(Vec<i64>, bool)> {
    body.split(';')
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (sign, path) = entry.split_once(':')?;
            Some((decode_path(path), sign == "+"))
        })
        .collect()
}

pub(crate) fn process(
    medium: &mut Medium,
    packet: PacketId,
    upstream: Sender,
    packets: &mut PacketArena,
) -> Vec<PendingSend> {
    let content = packets.get(packet).content.clone();
    if content == "KEEPALIVE" {
        return handle_keepalive(medium, packet, upstream, packets);
    }
    if let Some(body) = content.strip_prefix("UPDATE:") {
        let entries = decode_update(body);
        return handle_update(medium, upstream, entries, packets);
    }
    handle_data(medium, packet, packets)
}

fn handle_keepalive(
    medium: &mut Medium,
    packet: PacketId,
    upstream: Sender,
    packets: &mut PacketArena,
) -> Vec<PendingSend> {
    let src = packets.get(packet).source;
    let Some(via) = upstream.medium else { return Vec::new() };
    let id = medium.id;
    let self_id = id.0 as i64;
    let is_new = !state(medium).links.contains_key(&src);
    state_mut(medium).links.insert(src, via);
    state_mut(medium).keepalive_counters.insert(src, TIMEOUT);
    if is_new {
        state_mut(medium).routes.insert(src, vec![vec![src]]);
        state_mut(medium).stage(id, (vec![self_id, src], true));
    }
    Vec::new()
}

fn handle_update(
    medium: &mut Medium,
    upstream: Sender,
    entries: Vec<(Vec<i64>, bool)>,
    _packets: &mut PacketArena,
) -> Vec<PendingSend> {
    let self_id = medium.id.0 as i64;
    let id = medium.id;
    for (path, sign) in entries {
        if path.is_empty() {
            continue;
        }
        let dest = *path.last().unwrap();
        if dest == self_id || path.contains(&self_id) {
            continue;
        }
        if sign {
            let state = state_mut(medium);
            let entry = state.routes.entry(dest).or_default();
            if entry.is_empty() {
                entry.push(path.clone());
                let mut full = vec![self_id];
                full.extend(path.iter());
                state_mut(medium).stage(id, (full, true));
            } else {
                let shortest = entry.iter().map(Vec::len).min().unwrap_or(usize::MAX);
                if path.len() < shortest {
                    entry.clear();
                    entry.push(path.clone());
                    let mut full = vec![self_id];
                    full.extend(path.iter());
                    state_mut(medium).stage(id, (full, true));
                } else if path.len() <= shortest {
                    entry.push(path.clone());
                    let mut full = vec![self_id];
                    full.extend(path.iter());
                    state_mut(medium).stage(id, (full, true));
                }
            }
        } else {
            let removed: Vec<Vec<i64>> = {
                let state = state_mut(medium);
                let mut removed = Vec::new();
                if let Some(paths) = state.routes.get_mut(&dest) {
                    let (gone, kept): (Vec<_>, Vec<_>) =
                        std::mem::take(paths).into_iter().partition(|p| p.ends_with(path.as_slice()));
                    *paths = kept;
                    removed = gone;
                }
                if matches!(state.routes.get(&dest), Some(p) if p.is_empty()) {
                    state.routes.remove(&dest);
                }
                removed
            };
            for stored in removed {
                let mut full = vec![self_id];
                full.extend(stored.iter());
                state_mut(medium).stage(id, (full, false));
            }
        }
    }
    let _ = upstream;
    Vec::new()
}

fn handle_data(medium: &mut Medium, packet: PacketId, packets: &mut PacketArena) -> Vec<PendingSend> {
    let self_id = medium.id.0 as i64;
    let dest = packets.get(packet).dest;
    if dest == self_id {
        return Vec::new();
    }
    let chosen = {
        let state = state_mut(medium);
        match state.routes.get(&dest) {
            Some(paths) if !paths.is_empty() => {
                let idx = state.tie_break.gen_range(0..paths.len());
                Some(paths[idx][0])
            }
            _ => None,
        }
    };
    match chosen.and_then(|hop| state(medium).links.get(&hop).copied()) {
        Some(link) => vec![PendingSend { target: link, packet }],
        None => {
            push_capped(
                medium.id,
                packet,
                &mut state_mut(medium).buf_routing,
                (packet, Sender::default()),
                BUFFER_CAP,
                "routing queue full",
            );
            Vec::new()
        }
    }
}

pub(crate) fn periodic_tick(medium: &mut Medium, t: Tick, packets: &mut PacketArena) -> Vec<PendingSend> {
    let mut sends = Vec::new();

    // Retry anything waiting on a route.
    let pending: Vec<_> = state_mut(medium).buf_routing.drain(..).collect();
    for (packet, upstream) in pending {
        let dest = packets.get(packet).dest;
        let chosen = {
            let state = state_mut(medium);
            match state.routes.get(&dest) {
                Some(paths) if !paths.is_empty() => {
                    let idx = state.tie_break.gen_range(0..paths.len());
                    Some(paths[idx][0])
                }
                _ => None,
            }
        };
        match chosen.and_then(|hop| state(medium).links.get(&hop).copied()) {
            Some(link) => sends.push(PendingSend { target: link, packet }),
            None => {
                push_capped(
                    medium.id,
                    packet,
                    &mut state_mut(medium).buf_routing,
                    (packet, upstream),
                    BUFFER_CAP,
                    "routing queue full",
                );
            }
        }
    }

    // Service one `in` head if a pathway is free.
    if medium.in_transit.len() < medium.pathways {
        let head = state_mut(medium).buf_in.pop_front();
        if let Some((packet, upstream)) = head {
            medium.readmit(packet, upstream, packets);
        }
    }

    // Keepalives out, counters down, dead neighbors dropped.
    if t as i64 % (TIMEOUT / 4).max(1) == 0 {
        let (_, keepalive_sends) = medium.broadcast(packets, "KEEPALIVE");
        sends.extend(keepalive_sends);
    }
    let dead: Vec<i64> = {
        let state = state_mut(medium);
        let mut dead = Vec::new();
        for (&neighbor, counter) in state.keepalive_counters.iter_mut() {
            *counter -= 1;
            if *counter <= 0 {
                dead.push(neighbor);
            }
        }
        dead
    };
    for neighbor in dead {
        remove_neighbor(medium, neighbor, packets, &mut sends);
    }

    // Flush pending advertisements.
    if t as i64 % (TIMEOUT / 10).max(1) == 0 {
        let trimmed: Vec<(Vec<i64>, bool)> = {
            let state = state_mut(medium);
            let items: Vec<_> = state.to_advertise.drain(..).collect();
            items
                .into_iter()
                .filter(|(path, sign)| !*sign || !state.advertised.contains(path))
                .collect()
        };
        if !trimmed.is_empty() {
            for (path, sign) in &trimmed {
                if *sign {
                    state_mut(medium).advertised.insert(path.clone());
                }
            }
            let content = encode_update(&trimmed);
            let (_, update_sends) = medium.broadcast(packets, content);
            sends.extend(update_sends);
        }
    }

    let out: Vec<_> = state_mut(medium).buf_out.drain(..).collect();
    sends.extend(out.into_iter().map(|(target, packet)| PendingSend { target, packet }));

    sends
}

fn remove_neighbor(medium: &mut Medium, neighbor: i64, packets: &mut PacketArena, sends: &mut Vec<PendingSend>) {
    let id = medium.id;
    let self_id = id.0 as i64;
    state_mut(medium).keepalive_counters.remove(&neighbor);
    state_mut(medium).links.remove(&neighbor);
    let withdrawn: Vec<Vec<i64>> = {
        let state = state_mut(medium);
        let mut withdrawn = Vec::new();
        state.routes.retain(|_, paths| {
            let (gone, kept): (Vec<_>, Vec<_>) =
                std::mem::take(paths).into_iter().partition(|p| p.first() == Some(&neighbor));
            withdrawn.extend(gone);
            *paths = kept;
            !paths.is_empty()
        });
        withdrawn
    };
    for path in withdrawn {
        let mut full = vec![self_id];
        full.extend(path.iter());
        state_mut(medium).stage(id, (full, false));
    }
    let _ = sends;
    let _ = packets;
}

pub(crate) fn stage_out(medium: &mut Medium, target: MediumId, packet: PacketId) {
    let id = medium.id;
    let state = state_mut(medium);
    push_capped(id, packet, &mut state.buf_out, (target, packet), BUFFER_CAP, "out queue full");
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn update_wire_format_roundtrips() {
        let entries = vec![(vec![1, 2, 3], true), (vec![4], false)];
        let encoded = encode_update(&entries);
        assert_eq!(encoded, "UPDATE:+:1-2-3;-:4");
        let decoded = decode_update(encoded.strip_prefix("UPDATE:").unwrap());
        assert_eq!(decoded, entries);
    }

    fn bgplite_medium(id: usize) -> Medium {
        let mut rng = StdRng::seed_from_u64(id as u64);
        Medium::new(
            MediumId(id),
            4,
            1,
            100.0,
            0.0,
            true,
            Some(crate::types::Algorithm::BgpLite),
            vec![100.0; 10],
            vec![0.0; 10],
            &mut rng,
        )
    }

    #[test]
    fn withdrawal_stages_each_removed_path_by_its_own_content() {
        let mut medium = bgplite_medium(1);
        state_mut(&mut medium).routes.insert(9, vec![vec![2, 5, 9], vec![3, 9]]);
        state_mut(&mut medium).to_advertise.clear();
        let mut packets = PacketArena::new();
        let upstream = Sender { medium: Some(MediumId(3)), router: Some(3) };

        // A single incoming withdrawal naming the *shorter* path must remove only that stored
        // path, staging a withdrawal built from the removed path's own content, not the one
        // just received.
        handle_update(&mut medium, upstream, vec![(vec![3, 9], false)], &mut packets);

        assert_eq!(state(&medium).routes.get(&9), Some(&vec![vec![2, 5, 9]]));
        let staged = state(&medium).to_advertise.iter().cloned().collect::<Vec<_>>();
        assert_eq!(staged, vec![(vec![1, 3, 9], false)]);
    }
}
