//! The `reduce` subcommand: the full reduction session.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Args;

use alsvid_synth::{Budget, Config, SearchStrategy, Session, SynthesisMode};

use super::SolverArg;

/// Arguments of the reduction entry point.
#[derive(Args)]
pub struct ReduceArgs {
    /// The specification (BLIF, or AIGER by .aig/.aag suffix)
    pub specification: PathBuf,

    /// Where to write the reduced circuit
    pub output: PathBuf,

    /// Available time per run in seconds
    pub limit: u64,

    /// Fan-in of the synthesised gates
    #[arg(long = "gs", default_value = "2")]
    pub gate_inputs: usize,

    /// Initial subcircuit size (at least 2)
    #[arg(long, default_value = "6")]
    pub size: usize,

    /// Synthesise an AIG (restricts gates to the AND-inverter basis)
    #[arg(long)]
    pub aig: bool,

    /// Additionally write an AIGER copy of the result
    #[arg(long = "aig-out", requires = "aig")]
    pub aig_out: Option<PathBuf>,

    /// RNG seed; random when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Synthesis approach
    #[arg(long = "syn-mode", value_enum, default_value = "qbf")]
    pub syn_mode: SynModeArg,

    /// QBF solver dialect
    #[arg(long = "qbf-solver", value_enum, default_value = "qfun")]
    pub qbf_solver: SolverArg,

    /// Path to the solver binary (defaults to the solver's name in PATH)
    #[arg(long = "solver-path")]
    pub solver_path: Option<PathBuf>,

    /// Interleave the ABC optimiser between runs
    #[arg(long)]
    pub abc: bool,

    /// Path to the ABC binary
    #[arg(long = "abc-path", default_value = "abc")]
    pub abc_path: PathBuf,

    /// ABC preprocessing and optimisation scripts
    #[arg(long = "abc-cmds", num_args = 2, value_names = ["PRE", "CMDS"])]
    pub abc_cmds: Option<Vec<String>>,

    /// Number of restarts after the first run
    #[arg(long, default_value = "0")]
    pub restarts: usize,

    /// Stop each run after this many iterations
    #[arg(long)]
    pub it: Option<u64>,

    /// The specification's gates are already topologically ordered
    #[arg(long)]
    pub sorted: bool,

    /// Only consider subcircuits with a single output
    #[arg(long = "single-output")]
    pub single_output: bool,

    /// Disable dynamic per-size timeouts
    #[arg(long = "static-timeouts")]
    pub static_timeouts: bool,

    /// Base timeout for the individual QBF checks in seconds
    #[arg(long = "qbf-to", default_value = "120")]
    pub qbf_timeout: u64,

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

    /// Only splice replacements that are strictly smaller
    #[arg(long = "require-reduction")]
    pub require_reduction: bool,

    /// Disable constants as subcircuit outputs
    #[arg(long = "no-constant-outputs", action = clap::ArgAction::SetFalse)]
    pub constants_as_outputs: bool,

    /// Disable inputs as subcircuit outputs
    #[arg(long = "no-input-outputs", action = clap::ArgAction::SetFalse)]
    pub inputs_as_outputs: bool,

    /// Save the generated encodings in this directory
    #[arg(long = "log-enc")]
    pub log_enc: Option<PathBuf>,

    /// Log intermediate circuits in this directory
    #[arg(long = "log-spec")]
    pub log_spec: Option<PathBuf>,

    /// Iterations between intermediate results
    #[arg(long = "log-iteration-steps")]
    pub log_iteration_steps: Option<u64>,

    /// Seconds between intermediate results
    #[arg(long = "log-time-steps")]
    pub log_time_steps: Option<u64>,
}

/// Synthesis mode on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SynModeArg {
    /// Host-embedded QBF encoding.
    Qbf,
    /// Isolated exact-synthesis encoding.
    Exact,
}

pub fn execute(args: ReduceArgs) -> anyhow::Result<()> {
    if args.limit == 0 {
        bail!("the time limit must be a positive number of seconds");
    }
    if args.size < 2 {
        bail!("subcircuits of size at least 2 are required to reduce a circuit");
    }
    if args.log_spec.is_none()
        && args.log_enc.is_none()
        && (args.log_iteration_steps.is_some() || args.log_time_steps.is_some())
    {
        bail!("log steps given but neither circuits nor encodings are logged");
    }

    let mut config = Config::default();
    config.gate_inputs = args.gate_inputs;
    config.initial_subcircuit_size = args.size;
    config.synthesise_aig = args.aig;
    config.seed = args.seed;
    config.synthesis_mode = match args.syn_mode {
        SynModeArg::Qbf => SynthesisMode::Qbf,
        SynModeArg::Exact => SynthesisMode::Exact,
    };
    config.solver = args.qbf_solver.to_solver();
    config.solver_path = args
        .solver_path
        .unwrap_or_else(|| args.qbf_solver.default_path());
    config.use_abc = args.abc;
    config.abc_path = args.abc_path;
    if let Some(cmds) = args.abc_cmds {
        config.abc_preprocess_cmds = cmds[0].clone();
        config.abc_cmds = cmds[1].clone();
    }
    config.runs = args.restarts + 1;
    if args.single_output {
        config.search_strategy = SearchStrategy::SingleOutput;
    }
    config.use_dynamic_timeouts = !args.static_timeouts;
    config.base_timeout = Duration::from_secs(args.qbf_timeout);
    config.total_available_time = Duration::from_secs(args.limit);
    config.encoder.non_trivial = args.non_trivial;
    config.encoder.all_steps = args.all_steps;
    config.encoder.no_reapplication = args.no_reapplication;
    config.encoder.ordered_steps = args.ordered_steps;
    config.require_reduction = args.require_reduction;
    config.encoder.constants_as_outputs = args.constants_as_outputs;
    config.encoder.inputs_as_outputs = args.inputs_as_outputs;
    config.encoding_log_dir = args.log_enc;
    config.specification_log_dir = args.log_spec;
    config.log_iteration_steps = args.log_iteration_steps;
    config.log_time_steps = args.log_time_steps;

    let budget = Budget {
        time: Duration::from_secs(args.limit),
        iterations: args.it,
    };
    let mut session = Session::from_file(&args.specification, config, args.sorted)
        .with_context(|| format!("loading {}", args.specification.display()))?;
    session.reduce(budget)?;
    session
        .write(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    if let Some(aig_out) = args.aig_out {
        let path = match aig_out.extension().and_then(|e| e.to_str()) {
            Some("aig" | "aag") => aig_out,
            _ => aig_out.with_extension("aig"),
        };
        alsvid_io::write_aiger_file(&path, session.circuit())
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
