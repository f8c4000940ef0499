//! Flooding baseline: every packet is forwarded to every neighbor except where it came from, with
//! a bounded dedup cache preventing it from circulating forever.

use super::{push_capped, Medium, PendingSend, Sender, BUFFER_CAP};
use crate::packet::PacketArena;
use crate::types::{MediumId, PacketId};
use std::collections::VecDeque;

/// Per-medium flooding state.
#[derive(Debug, Default)]
pub struct FloodingState {
    seen: VecDeque<PacketId>,
    buf_in: VecDeque<(PacketId, Sender)>,
    buf_out: VecDeque<(MediumId, PacketId)>,
}

impl FloodingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `packet` as seen, returning `false` if it was already present (and thus should be
    /// dropped rather than admitted).
    pub(crate) fn check_and_record_seen(&mut self, packet: PacketId) -> bool {
        if self.seen.contains(&packet) {
            return false;
        }
        if self.seen.len() >= BUFFER_CAP {
            self.seen.pop_front();
        }
        self.seen.push_back(packet);
        true
    }

    pub(crate) fn receive_full(&mut self, id: MediumId, packet: PacketId, upstream: Sender) {
        push_capped(
            id,
            packet,
            &mut self.buf_in,
            (packet, upstream),
            BUFFER_CAP,
            "in queue full",
        );
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

fn state_mut(medium: &mut Medium) -> &mut FloodingState {
    match &mut medium.kind {
        super::MediumKind::Flooding(s) => s,
        _ => unreachable!("flooding::state_mut called on a non-flooding medium"),
    }
}

/// Forward a packet that just finished service to every neighbor except where it came from,
/// unless it already reached its destination here.
pub(crate) fn process(
    medium: &mut Medium,
    packet: PacketId,
    upstream: Sender,
    packets: &mut PacketArena,
) -> Vec<PendingSend> {
    let dest = packets.get(packet).dest;
    if dest == medium.id.0 as i64 {
        return Vec::new();
    }
    let mut sends = Vec::new();
    for &target in &medium.connections {
        if Some(target) == upstream.medium {
            continue;
        }
        sends.push(PendingSend { target, packet });
    }
    sends
}

/// After the base tick: retry the head of `in` if a pathway freed up, and retry every staged
/// `out` entry.
pub(crate) fn periodic_tick(medium: &mut Medium, packets: &mut PacketArena) -> Vec<PendingSend> {
    if medium.in_transit.len() < medium.pathways {
        let head = state_mut(medium).buf_in.pop_front();
        if let Some((packet, upstream)) = head {
            medium.readmit(packet, upstream, packets);
        }
    }
    let pending: Vec<_> = state_mut(medium).buf_out.drain(..).collect();
    pending
        .into_iter()
        .map(|(target, packet)| PendingSend { target, packet })
        .collect()
}

/// Stage a `(target, packet)` pair into this medium's own `out` buffer, because the target could
/// not accept it immediately. Used by [`crate::network::Network`] when dispatching a
/// [`PendingSend`] fails.
pub(crate) fn stage_out(medium: &mut Medium, target: MediumId, packet: PacketId) {
    let id = medium.id;
    let state = state_mut(medium);
    push_capped(
        id,
        packet,
        &mut state.buf_out,
        (target, packet),
        BUFFER_CAP,
        "out queue full",
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dedup_rejects_repeat() {
        let mut s = FloodingState::new();
        assert!(s.check_and_record_seen(PacketId(1)));
        assert!(!s.check_and_record_seen(PacketId(1)));
        assert!(s.check_and_record_seen(PacketId(2)));
    }

    #[test]
    fn seen_cache_evicts_oldest() {
        let mut s = FloodingState::new();
        for i in 0..BUFFER_CAP {
            assert!(s.check_and_record_seen(PacketId(i)));
        }
        assert!(s.check_and_record_seen(PacketId(0)));
    }
}
