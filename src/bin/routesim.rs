use clap::Parser;
use routesim::cli::Args;
use routesim::error::SimError;
use routesim::loader;
use routesim::metrics;
use routesim::network::Network;
use routesim::noise::SpectralFgn;

fn run(args: Args) -> Result<(), SimError> {
    let noise = SpectralFgn::new();
    let media = loader::load_topology(
        &args.topology,
        args.algorithm,
        args.hurst,
        args.deviation,
        args.limit,
        args.seed,
        &noise,
    )?;
    let workload = loader::load_workload(&args.workload)?;
    log::info!(
        "loaded {} media and {} workload packets",
        media.len(),
        workload.len()
    );

    let mut net = Network::new(media, workload, args.scenario, args.limit, args.seed)?;
    let workload_len = net.workload_len();
    let final_tick = net.run();
    log::info!("simulation terminated at tick {final_tick}");

    let report = metrics::compute(net.packets(), workload_len, args.algorithm);
    println!("{report}");

    Ok(())
}

fn main() {
    pretty_env_logger::init();
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("routesim: {err}");
        std::process::exit(1);
    }
}
