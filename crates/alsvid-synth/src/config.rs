//! Configuration of the reduction session.
//!
//! Everything tunable lives here, solver and ABC paths included; there is
//! no process-wide state. The CLI populates the struct from its arguments.

use std::path::PathBuf;
use std::time::Duration;

use alsvid_qbf::{EncoderOptions, QbfSolver};

use crate::error::{SynthError, SynthResult};

/// How subcircuits are grown around a random root gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// Greedily absorb the frontier gate that minimises the number of
    /// subcircuit outputs (ties: fewest inputs, then lowest level).
    OutputReduction,
    /// Expand toward the root's inputs, adding only gates whose consumers
    /// are all inside the set already.
    SingleOutput,
}

/// Which encoder the synthesiser drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisMode {
    /// Host-embedded encoding with downstream copy and acyclicity
    /// constraints.
    Qbf,
    /// Isolated gate-list encoding.
    Exact,
}

/// All tunables of a reduction session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of reduction runs; after each the loop restarts on the
    /// current circuit.
    pub runs: usize,
    /// RNG seed; random when unset.
    pub seed: Option<u64>,
    /// Restrict synthesised gates to the AIG basis and emit AIGER.
    pub synthesise_aig: bool,

    /// Interleave the external ABC optimiser between runs.
    pub use_abc: bool,
    /// The ABC binary.
    pub abc_path: PathBuf,
    /// ABC preprocessing script for the first application.
    pub abc_preprocess_cmds: String,
    /// ABC optimisation script, re-applied while it keeps improving.
    pub abc_cmds: String,

    /// Taboo list capacity as a fraction of the gate count; in (0, 1).
    pub taboo_ratio: f64,
    /// Iterations between subcircuit-size auto-tuning checks.
    pub check_subcircuit_size_interval: u64,
    /// Mean SAT seconds below which the subcircuit size is increased.
    pub subcircuit_size_increase_limit: f64,
    /// Samples required before the mean is trusted.
    pub subcircuit_size_increase_samples: usize,
    /// Maintain the taboo list at all.
    pub use_taboo_list: bool,
    /// Subcircuit size the loop starts with.
    pub initial_subcircuit_size: usize,
    /// Subcircuit growth strategy.
    pub search_strategy: SearchStrategy,
    /// Encoding flavour.
    pub synthesis_mode: SynthesisMode,
    /// Only splice replacements that are strictly smaller.
    pub require_reduction: bool,

    /// Which QBF solver dialect to speak.
    pub solver: QbfSolver,
    /// The solver binary.
    pub solver_path: PathBuf,
    /// Fan-in of the synthesised gates.
    pub gate_inputs: usize,
    /// Encoder feature toggles.
    pub encoder: EncoderOptions,
    /// Keep inputs-as-outputs enabled even when the subcircuit has feedback
    /// pairs. Off by default: the doubled connection-variable encoding is a
    /// best-effort over-approximation.
    pub inputs_as_outputs_with_cycles: bool,

    /// Enforce per-check timeouts at all.
    pub use_timeouts: bool,
    /// Adapt per-size timeouts from recorded solving times.
    pub use_dynamic_timeouts: bool,
    /// Default wall-clock budget of one reduction run.
    pub total_available_time: Duration,
    /// Initial timeout of one solver check.
    pub base_timeout: Duration,
    /// Lower clamp for adapted timeouts.
    pub minimal_timeout: Duration,
    /// Multiplier on the adjusted mean SAT time.
    pub timeout_factor: f64,
    /// Fold the base timeout into the mean until this many samples exist.
    pub adjust_until: usize,

    /// Check every replacement for exact equivalence and count the results.
    pub log_equivalent_replacements: bool,
    /// Log the gates of every replacement.
    pub log_replaced_gates: bool,
    /// Directory for the generated encodings.
    pub encoding_log_dir: Option<PathBuf>,
    /// Directory for intermediate circuit snapshots.
    pub specification_log_dir: Option<PathBuf>,
    /// Snapshot every this many seconds.
    pub log_time_steps: Option<u64>,
    /// Snapshot every this many iterations.
    pub log_iteration_steps: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runs: 1,
            seed: None,
            synthesise_aig: false,
            use_abc: false,
            abc_path: PathBuf::from("abc"),
            abc_preprocess_cmds: "fraig -C 50000".into(),
            abc_cmds: DEFAULT_ABC_CMDS.into(),
            taboo_ratio: 0.6,
            check_subcircuit_size_interval: 50,
            subcircuit_size_increase_limit: 30.0,
            subcircuit_size_increase_samples: 50,
            use_taboo_list: true,
            initial_subcircuit_size: 6,
            search_strategy: SearchStrategy::OutputReduction,
            synthesis_mode: SynthesisMode::Qbf,
            require_reduction: false,
            solver: QbfSolver::Qfun,
            solver_path: PathBuf::from(QbfSolver::Qfun.default_command()),
            gate_inputs: 2,
            encoder: EncoderOptions::default(),
            inputs_as_outputs_with_cycles: false,
            use_timeouts: true,
            use_dynamic_timeouts: true,
            total_available_time: Duration::from_secs(18_000),
            base_timeout: Duration::from_secs(120),
            minimal_timeout: Duration::from_secs(1),
            timeout_factor: 1.4,
            adjust_until: 50,
            log_equivalent_replacements: false,
            log_replaced_gates: false,
            encoding_log_dir: None,
            specification_log_dir: None,
            log_time_steps: None,
            log_iteration_steps: None,
        }
    }
}

impl Config {
    /// Check value ranges; called once at session start.
    pub fn validate(&self) -> SynthResult<()> {
        if !(self.taboo_ratio > 0.0 && self.taboo_ratio < 1.0) {
            return Err(SynthError::Config(format!(
                "taboo_ratio must lie in (0, 1), got {}",
                self.taboo_ratio
            )));
        }
        if self.subcircuit_size_increase_limit <= 0.0 {
            return Err(SynthError::Config(
                "subcircuit_size_increase_limit must be positive".into(),
            ));
        }
        if self.total_available_time.is_zero() || self.base_timeout.is_zero() {
            return Err(SynthError::Config("timeouts must be positive".into()));
        }
        if self.gate_inputs < 2 {
            return Err(SynthError::Config(
                "synthesised gates need a fan-in of at least 2".into(),
            ));
        }
        if self.initial_subcircuit_size < 2 {
            return Err(SynthError::Config(
                "subcircuits of size at least 2 are required for reductions".into(),
            ));
        }
        if self.synthesise_aig && self.gate_inputs != 2 {
            return Err(SynthError::Config(
                "AIG synthesis requires a gate fan-in of 2".into(),
            ));
        }
        Ok(())
    }
}

/// The battle-tested ABC script the original deployment used between runs.
const DEFAULT_ABC_CMDS: &str = "balance; resub -K 6; rewrite; resub -K 6 -N 2; refactor; resub -K 8; balance; resub -K 8 -N 2; rewrite; resub -K 10; rewrite -z; \
resub -K 10 -N 2; balance; resub -K 12; refactor -z; resub -K 12 -N 2; rewrite -z; balance; resub -K 10 -N 1 -v -F 4; balance; resub -K 6; rewrite; \
resub -K 6 -N 2; refactor; resub -K 8; balance; resub -K 8 -N 2; rewrite; resub -K 10; rewrite -z; resub -K 10 -N 2; balance; resub -K 12; \
refactor -z; resub -K 12 -N 2; rewrite -z; balance; resub -K 10 -N 1 -v -F 4; balance; rewrite; rewrite -z; balance; rewrite -z; balance; balance; \
rewrite; refactor; balance; rewrite; rewrite -z; balance; refactor -z; rewrite -z; balance; dc2; balance; rewrite; balance; rewrite; rewrite -z; balance; \
rewrite -z; balance; balance; resub -K 6; rewrite; resub -K 6 -N 2; refactor; resub -K 8; balance; resub -K 8 -N 2; rewrite; resub -K 10; rewrite -z; \
resub -K 10 -N 2; balance; resub -K 12; refactor -z; resub -K 12 -N 2; rewrite -z; balance";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_taboo_ratio_range() {
        let mut cfg = Config::default();
        cfg.taboo_ratio = 1.0;
        assert!(cfg.validate().is_err());
        cfg.taboo_ratio = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_aig_requires_two_input_gates() {
        let mut cfg = Config::default();
        cfg.synthesise_aig = true;
        cfg.gate_inputs = 3;
        assert!(cfg.validate().is_err());
        cfg.gate_inputs = 2;
        cfg.validate().unwrap();
    }
}
