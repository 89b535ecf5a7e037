//! Pnflow - Reactive transport on a cubic pore network
//!
//! Builds a cubic network with uniform throat conductance, fixes the quantity
//! on one face, applies standard kinetics `r = A·x^b` on another, and prints
//! a summary of the run.
//!
//! # Usage
//!
//! ```bash
//! pnflow --shape 9 9 9 --conductance 1e-15 --prefactor -1e-15 --exponent 2
//! ```

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use pnflow::{
    network::NetworkView,
    solver::StandardKinetics,
    Network, PropertyProvider, PropertyStore, ReactiveTransport, Result, TransportSettings,
};

/// Steady reactive transport on a cubic pore network
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Lattice size in pores along x, y and z
    #[arg(long, num_args = 3, value_names = ["NX", "NY", "NZ"], default_values_t = [9, 9, 9])]
    shape: Vec<usize>,

    /// Uniform throat conductance
    #[arg(long, default_value_t = 1e-15)]
    conductance: f64,

    /// Kinetics prefactor A
    #[arg(long, default_value_t = -1e-15, allow_hyphen_values = true)]
    prefactor: f64,

    /// Kinetics exponent b
    #[arg(long, default_value_t = 2.0, allow_hyphen_values = true)]
    exponent: f64,

    /// Label of the pores carrying the source
    #[arg(long, default_value = "bottom")]
    source_label: String,

    /// Label of the pores held at a fixed value
    #[arg(long, default_value = "top")]
    bc_label: String,

    /// Value imposed on the boundary pores
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    bc_value: f64,

    /// Convergence tolerance
    #[arg(long, default_value_t = pnflow::solver::DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Maximum number of iterations
    #[arg(long, default_value_t = pnflow::solver::DEFAULT_MAX_ITERATIONS)]
    max_iter: usize,

    /// Source relaxation factor
    #[arg(long, default_value_t = 1.0)]
    relaxation_source: f64,

    /// Quantity relaxation factor
    #[arg(long, default_value_t = 1.0)]
    relaxation_quantity: f64,

    /// Consecutive residual increases treated as divergence
    #[arg(long, default_value_t = pnflow::solver::DEFAULT_DIVERGENCE_WINDOW)]
    divergence_window: usize,

    /// Log level (error, warn, info, debug, trace); RUST_LOG is used if unset
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) {
    let mut builder = Builder::from_default_env();
    if let Some(filter) = level.and_then(|l| l.parse::<LevelFilter>().ok()) {
        builder.filter_level(filter);
    }
    builder.format_timestamp_millis().init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let network = Network::cubic([args.shape[0], args.shape[1], args.shape[2]])?;
    let mut phase = PropertyStore::for_network(&network);
    phase.set(
        "throat.diffusive_conductance",
        vec![args.conductance; network.num_throats()],
    )?;

    let settings = TransportSettings::default()
        .with_tolerance(args.tolerance)
        .with_max_iter(args.max_iter)
        .with_relaxation(args.relaxation_source, args.relaxation_quantity)
        .with_divergence_window(args.divergence_window);

    let mut alg = ReactiveTransport::new(&network, settings)?;
    alg.set_value_bc(&network.pores(&args.bc_label)?, args.bc_value)?;
    alg.set_source(
        &network.pores(&args.source_label)?,
        "pore.reaction",
        StandardKinetics::new(args.prefactor, args.exponent),
    )?;

    let result = alg.run(&mut phase, None)?;

    println!("status:     {}", alg.state());
    println!("iterations: {}", result.iterations);
    println!("residual:   {:.3e}", result.residual);
    println!("mean:       {:.6}", result.mean());

    Ok(())
}
