//! The `exact` subcommand: bottom-up exact minimum gate count.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Args;

use alsvid_synth::{Config, Synthesiser};

use super::SolverArg;

/// Arguments of the exact-synthesis entry point.
#[derive(Args)]
pub struct ExactArgs {
    /// The specification (BLIF, or AIGER by .aig/.aag suffix)
    pub specification: PathBuf,

    /// Where to write the synthesised circuit
    pub output: PathBuf,

    /// Fan-in of the synthesised gates
    #[arg(long = "gs", default_value = "2")]
    pub gate_inputs: usize,

    /// Generate an AIG instead of a netlist
    #[arg(long)]
    pub aig: bool,

    /// QBF solver dialect
    #[arg(long = "qbf-solver", value_enum, default_value = "qfun")]
    pub qbf_solver: SolverArg,

    /// Path to the solver binary (defaults to the solver's name in PATH)
    #[arg(long = "solver-path")]
    pub solver_path: Option<PathBuf>,

    /// Disable the non-trivial symmetry-breaking constraint
    #[arg(short = 'N', action = clap::ArgAction::SetFalse)]
    pub non_trivial: bool,

    /// Disable the use-all-steps symmetry-breaking constraint
    #[arg(short = 'A', action = clap::ArgAction::SetFalse)]
    pub all_steps: bool,

    /// Disable the no-reapplication symmetry-breaking constraint
    #[arg(short = 'R', action = clap::ArgAction::SetFalse)]
    pub no_reapplication: bool,

    /// Disable the ordered-steps symmetry-breaking constraint
    #[arg(short = 'O', action = clap::ArgAction::SetFalse)]
    pub ordered_steps: bool,

    /// Do not use per-gate input variables in the encoding
    #[arg(long = "no-input-vars", action = clap::ArgAction::SetFalse)]
    pub input_vars: bool,
}

pub fn execute(args: ExactArgs) -> anyhow::Result<()> {
    let mut config = Config::default();
    config.gate_inputs = args.gate_inputs;
    config.synthesise_aig = args.aig;
    config.solver = args.qbf_solver.to_solver();
    config.solver_path = args
        .solver_path
        .unwrap_or_else(|| args.qbf_solver.default_path());
    config.encoder.non_trivial = args.non_trivial;
    config.encoder.all_steps = args.all_steps;
    config.encoder.no_reapplication = args.no_reapplication;
    config.encoder.ordered_steps = args.ordered_steps;
    config.encoder.gate_input_variables = args.input_vars;
    config.validate().map_err(anyhow::Error::from)?;

    let mut circuit = alsvid_io::read_circuit(&args.specification, false)
        .with_context(|| format!("loading {}", args.specification.display()))?;

    let begin = Instant::now();
    let mut synthesiser = Synthesiser::new(&config);
    let size = synthesiser.bottom_up(&mut circuit)?;
    println!("Total time: {:.3}s", begin.elapsed().as_secs_f64());
    println!("Minimal size: {size}");

    if args.aig {
        alsvid_io::write_aiger_file(&args.output, &circuit)
            .with_context(|| format!("writing {}", args.output.display()))?;
    } else {
        alsvid_io::write_blif_file(&args.output, &circuit, "spec")
            .with_context(|| format!("writing {}", args.output.display()))?;
    }
    Ok(())
}
