//! Post-run metrics: packet loss rate, data loss rate, latency (mean and tail), and mean
//! throughput, derived from the packet arena once a run has terminated.

use crate::packet::PacketArena;
use crate::types::Algorithm;
use std::fmt;

/// Aggregated performance metrics for a completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub algorithm: Algorithm,
    /// Fraction of workload packets never delivered.
    pub packet_loss_rate: f64,
    /// Fraction of workload bytes never delivered.
    pub data_loss_rate: f64,
    /// Mean ticks between injection and delivery, over delivered packets only.
    pub mean_latency: f64,
    /// Worst-case ticks between injection and delivery, over delivered packets only.
    pub tail_latency: i64,
    /// Delivered bytes per tick of cumulative transit time.
    pub mean_throughput: f64,
}

/// Compute a [`Report`] from every data packet in `packets`. `workload_len` is the number of
/// packets injected by the workload (the loss-rate denominator), which may differ from
/// `packets.len()` because the arena also holds routing-protocol control traffic.
pub fn compute(packets: &PacketArena, workload_len: usize, algorithm: Algorithm) -> Report {
    let mut total_bytes: u64 = 0;
    let mut lost_bytes: u64 = 0;
    let mut dropped: usize = 0;
    let mut transit_time: i64 = 0;
    let mut delivered: usize = 0;
    let mut tail_latency: i64 = 0;

    for packet in packets.iter() {
        if packet.is_control() {
            continue;
        }
        total_bytes += packet.byte_size;
        if packet.time_arrived == -1 {
            dropped += 1;
            lost_bytes += packet.byte_size;
        } else {
            let latency = packet.time_arrived - packet.time_sent;
            transit_time += latency;
            tail_latency = tail_latency.max(latency);
            delivered += 1;
        }
    }

    let packet_loss_rate = if workload_len > 0 { dropped as f64 / workload_len as f64 } else { 0.0 };
    let data_loss_rate = if total_bytes > 0 { lost_bytes as f64 / total_bytes as f64 } else { 0.0 };
    let mean_latency = if delivered > 0 { transit_time as f64 / delivered as f64 } else { 0.0 };
    let mean_throughput = if transit_time > 0 {
        (total_bytes - lost_bytes) as f64 / transit_time as f64
    } else {
        0.0
    };

    Report {
        algorithm,
        packet_loss_rate,
        data_loss_rate,
        mean_latency,
        tail_latency,
        mean_throughput,
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ALGORITHM: {}", self.algorithm)?;
        writeln!(f, "PACKET LOSS RATE: {:.6}", self.packet_loss_rate)?;
        writeln!(f, "DATA LOSS RATE: {:.6}", self.data_loss_rate)?;
        writeln!(f, "AVERAGE LATENCY: {:.6}", self.mean_latency)?;
        writeln!(f, "TAIL LATENCY: {}", self.tail_latency)?;
        write!(f, "AVERAGE THROUGHPUT: {:.6}", self.mean_throughput)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::Packet;

    #[test]
    fn all_delivered_has_zero_loss() {
        let mut packets = PacketArena::new();
        for (sent, arrived) in [(0, 5), (0, 10)] {
            let p = packets.insert(Packet::data(0, 1, 100));
            packets.get_mut(p).time_sent = sent;
            packets.get_mut(p).time_arrived = arrived;
        }
        let report = compute(&packets, 2, Algorithm::Flooding);
        assert_eq!(report.packet_loss_rate, 0.0);
        assert_eq!(report.data_loss_rate, 0.0);
        assert!((report.mean_latency - 7.5).abs() < 1e-9);
        assert_eq!(report.tail_latency, 10);
    }

    #[test]
    fn dropped_packets_count_toward_loss_rates() {
        let mut packets = PacketArena::new();
        let delivered = packets.insert(Packet::data(0, 1, 100));
        packets.get_mut(delivered).time_sent = 0;
        packets.get_mut(delivered).time_arrived = 4;
        let dropped = packets.insert(Packet::data(0, 1, 300));
        packets.get_mut(dropped).time_sent = 0;
        packets.get_mut(dropped).time_arrived = -1;

        let report = compute(&packets, 2, Algorithm::Aodv);
        assert!((report.packet_loss_rate - 0.5).abs() < 1e-9);
        assert!((report.data_loss_rate - 0.75).abs() < 1e-9);
        assert_eq!(report.tail_latency, 4);
    }

    #[test]
    fn control_traffic_is_excluded() {
        let mut packets = PacketArena::new();
        let control = packets.insert(Packet::control(0, -1, "HELLO"));
        packets.get_mut(control).time_sent = 0;
        packets.get_mut(control).time_arrived = 1;
        let report = compute(&packets, 0, Algorithm::Flooding);
        assert_eq!(report.packet_loss_rate, 0.0);
        assert_eq!(report.mean_latency, 0.0);
    }
}
