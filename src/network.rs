//! The simulation driver: owns every medium and packet for a run, advances the tick loop, and
//! detects termination.
//!
//! A tick is inject → tick all media (ascending id order) → scenario, exactly as laid out in
//! [`crate::scenario`]. This order is the crate's determinism contract: two runs with the same
//! seed, topology, and workload visit ticks, media, and packets in the same sequence and so
//! produce byte-identical metrics.

use crate::error::SimError;
use crate::loader::WorkloadEntry;
use crate::medium::{omniscient, Medium, MediumKind, PendingSend, Sender};
use crate::packet::{Packet, PacketArena};
use crate::scenario::{Scenario, ScenarioConfig};
use crate::types::{MediumId, Tick};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::mem;

/// Owns the medium arena, the packet arena, and the workload for one simulation run.
#[derive(Debug)]
pub struct Network {
    media: Vec<Medium>,
    packets: PacketArena,
    workload: Vec<WorkloadEntry>,
    next_workload: usize,
    scenario: Scenario,
    rng: StdRng,
    limit: Tick,
}

impl Network {
    /// Build a network from an already-constructed medium arena (see [`crate::loader`]) and a
    /// sorted workload.
    pub fn new(
        media: Vec<Medium>,
        workload: Vec<WorkloadEntry>,
        scenario_config: ScenarioConfig,
        limit: Tick,
        seed: u64,
    ) -> Result<Self, SimError> {
        for entry in &workload {
            if entry.source >= media.len() {
                return Err(SimError::UnknownSource(entry.source));
            }
        }
        let scenario = Scenario::new(scenario_config, &media, limit);
        Ok(Self {
            media,
            packets: PacketArena::new(),
            workload,
            next_workload: 0,
            scenario,
            rng: StdRng::seed_from_u64(seed),
            limit,
        })
    }

    /// The arena of every packet ever created during this run, including the ones still in
    /// flight if the run has not finished.
    pub fn packets(&self) -> &PacketArena {
        &self.packets
    }

    /// Borrow the current medium arena.
    pub fn media(&self) -> &[Medium] {
        &self.media
    }

    /// Number of packets the workload scheduled for injection, the denominator for packet loss
    /// rate (distinct from `packets().len()`, which also counts routing-protocol control
    /// traffic).
    pub fn workload_len(&self) -> usize {
        self.workload.len()
    }

    /// Run the tick loop until termination or `limit` is reached, whichever comes first. Returns
    /// the final tick reached.
    pub fn run(&mut self) -> Tick {
        let mut t = 0;
        loop {
            self.inject(t);
            self.tick_media(t);
            self.scenario.tick(t, &mut self.media, &mut self.rng);
            if self.terminated() || t >= self.limit {
                return t;
            }
            t += 1;
        }
    }

    /// Inject every workload packet scheduled for `t`, in the order they were sorted.
    fn inject(&mut self, t: Tick) {
        while self.next_workload < self.workload.len() && self.workload[self.next_workload].tick == t {
            let entry = self.workload[self.next_workload];
            self.next_workload += 1;
            let packet = self
                .packets
                .insert(Packet::data(entry.source as i64, entry.dest, entry.byte_size));
            self.packets.get_mut(packet).time_sent = t as i64;
            log::debug!("t={t}: injecting {packet} ({} -> {})", entry.source, entry.dest);
            self.media[entry.source].receive(packet, Sender::default(), &self.packets);
        }
    }

    /// Advance every medium by one tick, in ascending id order, dispatching whatever each one
    /// produces before moving to the next.
    fn tick_media(&mut self, t: Tick) {
        for idx in 0..self.media.len() {
            let mut medium = mem::replace(&mut self.media[idx], Medium::placeholder());

            let mut sends = Vec::new();
            let ready = medium.advance_in_transit(t, &mut self.packets, &mut self.rng);
            for (packet, upstream) in ready {
                let produced = if matches!(medium.kind, MediumKind::Omniscient(_)) {
                    omniscient::process_with_media(&medium, &self.media, packet, &self.packets)
                } else {
                    medium.process(packet, upstream, t, &mut self.packets)
                };
                sends.extend(produced);
            }
            sends.extend(medium.periodic_tick(t, &mut self.packets));

            for send in sends {
                self.dispatch(idx, &mut medium, send);
            }

            self.media[idx] = medium;
        }
    }

    /// Hand a [`PendingSend`] produced by `source` to its target, or stage it back into `source`'s
    /// own `out` buffer if the target cannot accept it immediately.
    ///
    /// `source` is passed separately from `self.media` because its arena slot currently holds a
    /// placeholder (see [`Network::tick_media`]).
    fn dispatch(&mut self, source_idx: usize, source: &mut Medium, send: PendingSend) {
        let target_idx = send.target.0;
        let router = if self.media[target_idx].logic {
            source.connections.iter().find(|&&c| c.0 != target_idx).map(|c| c.0 as i64)
        } else {
            None
        };
        let upstream = Sender { medium: Some(MediumId(source_idx)), router };
        if self.media[target_idx].can_accept_immediately() {
            self.media[target_idx].receive(send.packet, upstream, &self.packets);
        } else {
            source.stage_out(send.target, send.packet);
        }
    }

    /// Every workload packet has been injected, every medium's `in_transit` is empty, and every
    /// medium's buffers are empty.
    fn terminated(&self) -> bool {
        if self.next_workload < self.workload.len() {
            return false;
        }
        self.media
            .iter()
            .all(|m| m.in_transit.is_empty() && m.buffers_empty())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::medium::Medium;
    use crate::types::Algorithm;

    fn flat_medium(id: usize, pathways: usize, algorithm: Option<Algorithm>, logic: bool, len: usize) -> Medium {
        let throughput = vec![100.0; len];
        let drop = vec![0.0; len];
        let mut rng = StdRng::seed_from_u64(id as u64);
        Medium::new(MediumId(id), pathways, 1, 100.0, 0.0, logic, algorithm, throughput, drop, &mut rng)
    }

    #[test]
    fn linear_chain_flooding_delivers() {
        let limit = 200;
        let len = limit as usize + 1;
        // Topology: router0 -- link1 -- router2 -- link3 -- router4.
        let mut r0 = flat_medium(0, 4, Some(Algorithm::Flooding), true, len);
        let mut l1 = flat_medium(1, 4, None, false, len);
        let mut r2 = flat_medium(2, 4, Some(Algorithm::Flooding), true, len);
        let mut l3 = flat_medium(3, 4, None, false, len);
        let mut r4 = flat_medium(4, 4, Some(Algorithm::Flooding), true, len);

        r0.connections = vec![MediumId(1)];
        l1.connections = vec![MediumId(0), MediumId(2)];
        r2.connections = vec![MediumId(1), MediumId(3)];
        l3.connections = vec![MediumId(2), MediumId(4)];
        r4.connections = vec![MediumId(3)];

        let media = vec![r0, l1, r2, l3, r4];
        let workload = vec![WorkloadEntry { tick: 0, source: 0, dest: 4, byte_size: 100 }];
        let mut net = Network::new(media, workload, ScenarioConfig::None, limit, 1).unwrap();
        net.run();

        let delivered = net.packets.iter().find(|p| !p.is_control()).unwrap();
        assert!(delivered.time_arrived > 0);
        assert_eq!(delivered.byte_size, 100);
    }

    #[test]
    fn overflow_drops_all_but_one() {
        let limit = 20;
        let len = limit as usize + 1;
        let link = flat_medium(0, 1, None, false, len);
        let media = vec![link];
        let workload: Vec<WorkloadEntry> = (0..10)
            .map(|_| WorkloadEntry { tick: 0, source: 0, dest: 0, byte_size: 10 })
            .collect();
        let mut net = Network::new(media, workload, ScenarioConfig::None, limit, 7).unwrap();
        net.run();

        let delivered = net.packets.iter().filter(|p| p.time_arrived > 0).count();
        let dropped = net.packets.iter().filter(|p| p.time_arrived == -1).count();
        assert_eq!(delivered, 1);
        assert_eq!(dropped, 9);
    }

    #[test]
    fn determinism_same_seed_same_metrics() {
        let build = || {
            let limit: Tick = 300;
            let len = limit as usize + 1;
            let mut r0 = flat_medium(0, 2, Some(Algorithm::Aodv), true, len);
            let mut l1 = flat_medium(1, 2, None, false, len);
            let mut r2 = flat_medium(2, 2, Some(Algorithm::Aodv), true, len);
            r0.connections = vec![MediumId(1)];
            l1.connections = vec![MediumId(0), MediumId(2)];
            r2.connections = vec![MediumId(1)];
            let media = vec![r0, l1, r2];
            let workload = vec![WorkloadEntry { tick: 10, source: 0, dest: 2, byte_size: 50 }];
            let mut net = Network::new(media, workload, ScenarioConfig::None, limit, 42).unwrap();
            net.run();
            net.packets.iter().map(|p| (p.time_sent, p.time_arrived)).collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }
}
