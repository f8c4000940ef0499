#![deny(missing_debug_implementations)]

//! # routesim
//!
//! A discrete-tick network simulator used to compare routing protocols under identical topology,
//! workload, and disruption conditions.
//!
//! A run is built from a topology (a set of routers and physical links, each a [`medium::Medium`])
//! and a workload (timed packet injection events), then driven to completion by
//! [`network::Network::run`]. Every router in the topology runs the same
//! [`types::Algorithm`] — flooding, omniscient Dijkstra, AODV, or a simplified BGP path-vector —
//! so different algorithms can be compared on the same synthetic network. Packet throughput and
//! loss are perturbed per tick by a deterministic long-range-dependent noise source
//! ([`noise::NoiseSource`]), and a [`scenario::Scenario`] may periodically disable a medium or
//! rewire a link mid-run. [`metrics::compute`] derives packet loss rate, data loss rate, latency,
//! and throughput from the finished run.
//!
//! ## Example
//!
//! ```
//! use routesim::medium::Medium;
//! use routesim::network::Network;
//! use routesim::loader::WorkloadEntry;
//! use routesim::scenario::ScenarioConfig;
//! use routesim::types::{Algorithm, MediumId};
//! use rand::SeedableRng;
//!
//! let len = 11;
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let mut host = Medium::new(MediumId(0), 1, 1, 100.0, 0.0, true, Some(Algorithm::Flooding), vec![100.0; len], vec![0.0; len], &mut rng);
//! let mut dest = Medium::new(MediumId(1), 1, 1, 100.0, 0.0, true, Some(Algorithm::Flooding), vec![100.0; len], vec![0.0; len], &mut rng);
//! host.connections = vec![MediumId(1)];
//! dest.connections = vec![MediumId(0)];
//!
//! let workload = vec![WorkloadEntry { tick: 0, source: 0, dest: 1, byte_size: 64 }];
//! let mut net = Network::new(vec![host, dest], workload, ScenarioConfig::None, 10, 0).unwrap();
//! net.run();
//! ```

pub mod cli;
pub mod error;
pub mod loader;
pub mod medium;
pub mod metrics;
pub mod network;
pub mod noise;
pub mod packet;
pub mod scenario;
pub mod types;
