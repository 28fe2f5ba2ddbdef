//! CLI subcommands.

pub mod exact;
pub mod reduce;

use std::path::PathBuf;

use alsvid_qbf::QbfSolver;

/// Solver choice on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SolverArg {
    /// The qfun solver.
    Qfun,
    /// The quabs solver.
    Quabs,
    /// The miniQU solver.
    Miniqu,
}

impl SolverArg {
    pub fn to_solver(self) -> QbfSolver {
        match self {
            SolverArg::Qfun => QbfSolver::Qfun,
            SolverArg::Quabs => QbfSolver::Quabs,
            SolverArg::Miniqu => QbfSolver::MiniQu,
        }
    }

    pub fn default_path(self) -> PathBuf {
        PathBuf::from(self.to_solver().default_command())
    }
}
