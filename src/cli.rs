//! Command-line surface for the `routesim` binary.

use crate::scenario::ScenarioConfig;
use crate::types::{Algorithm, Tick};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Discrete-tick routing protocol simulator")]
pub struct Args {
    /// Routing algorithm every router in the topology runs.
    #[arg(short, long)]
    pub algorithm: Algorithm,

    /// Path to the topology CSV.
    pub topology: PathBuf,

    /// Path to the workload CSV.
    pub workload: PathBuf,

    /// Mid-run perturbation scenario.
    #[arg(short, long, default_value = "none")]
    pub scenario: ScenarioConfig,

    /// Number of ticks to run before forcing termination.
    #[arg(short, long, default_value_t = 10_000)]
    pub limit: Tick,

    /// Hurst parameter of the long-range-dependent noise source, in `(0, 1)`.
    #[arg(long, default_value_t = 0.7)]
    pub hurst: f64,

    /// Multiplier on how strongly the noise source perturbs byte rate and drop rate.
    #[arg(long, default_value_t = 0.2)]
    pub deviation: f64,

    /// Seed for every deterministic RNG used in this run.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Accepted for interface compatibility with the network visualiser; has no effect here.
    #[arg(long)]
    pub animate: bool,
}
