//! Kinetic - kinetic scheme integrator
//!
//! Reads a scheme file and prints either its steady state or a time course
//! as a tab-separated table.
//!
//! # Usage
//!
//! ```bash
//! kinetic channel.kin --steady
//! kinetic channel.kin --dt 0.1 --steps 200 > course.tsv
//! ```

use std::path::PathBuf;

use clap::Parser;
use kinetic_core::{
    dsl,
    error::Result,
    report,
    scheme::{validate_scheme, KineticScheme},
    solver::SolverConfig,
    Simulator,
};
use log::info;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

/// Kinetic scheme integrator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scheme description file
    #[arg(value_name = "SCHEME_FILE")]
    scheme_file: PathBuf,

    /// Relax to steady state instead of integrating in time
    #[arg(long)]
    steady: bool,

    /// Time step
    #[arg(long, default_value_t = 0.1)]
    dt: f64,

    /// Number of time steps
    #[arg(long, default_value_t = 100)]
    steps: usize,

    /// Convergence tolerance on the state change
    #[arg(long, default_value_t = kinetic_core::solver::CONVERGE)]
    tolerance: f64,

    /// Maximum fixed-point passes per step
    #[arg(long, default_value_t = kinetic_core::solver::MAXSTEPS)]
    max_steps: usize,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", value_parser = parse_level)]
    log_level: LevelFilter,
}

fn parse_level(s: &str) -> std::result::Result<LevelFilter, String> {
    s.parse::<LevelFilter>()
        .map_err(|_| format!("invalid log level '{}'", s))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // A second logger cannot be installed; ignore
    let _ = TermLogger::init(
        args.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    // Parse and build the scheme
    let ast = dsl::parse_file(&args.scheme_file)?;
    let scheme = KineticScheme::from_ast(ast)?;
    validate_scheme(&scheme)?;
    info!(
        "loaded {} species, {} reactions, {} conservation laws",
        scheme.num_species(),
        scheme.reactions.len(),
        scheme.conserves.len()
    );

    let config = SolverConfig::new()
        .with_converge(args.tolerance)
        .with_max_steps(args.max_steps);
    let names = scheme.species_names.clone();
    let mut simulator = Simulator::with_config(scheme, config);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.steady {
        simulator.steady_state()?;
        report::write_steady_state(&mut out, &names, simulator.states())?;
    } else {
        let course = simulator.run(args.steps, args.dt)?;
        report::write_time_course(&mut out, &names, &course)?;
    }

    Ok(())
}
