//! Error types for encoding and solver interaction.

use std::time::Duration;

use thiserror::Error;

/// Errors from the QBF layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QbfError {
    /// A subcircuit with no inputs was selected; this signals a bug in the
    /// subcircuit selection, so the caller dumps context and aborts.
    #[error("subcircuit {subcircuit:?} has no inputs")]
    NoInputs {
        /// The offending gate set.
        subcircuit: Vec<u32>,
    },

    /// The subcircuit has no outputs. Recoverable: the empty replacement is
    /// trivially equivalent.
    #[error("subcircuit has no outputs")]
    NoOutputs,

    /// Fewer subcircuit inputs than the gate fan-in; the attempt is skipped.
    #[error("subcircuit has {available} inputs but synthesised gates take {required}")]
    NotEnoughInputs {
        /// Inputs available.
        available: usize,
        /// Required gate fan-in.
        required: usize,
    },

    /// Internal inconsistency while emitting an encoding.
    #[error("inconsistent encoding state: {0}")]
    Encoding(String),

    /// The solver exceeded its budget and was killed.
    #[error("QBF solver timed out after {0:?}")]
    Timeout(Duration),

    /// The solver exited with a code other than 10 or 20.
    #[error("QBF solver failed (exit code {code:?}): {stderr}")]
    SolverFailed {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The satisfying assignment could not be interpreted.
    #[error("invalid solver certificate: {0}")]
    InvalidCertificate(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for the QBF layer.
pub type QbfResult<T> = Result<T, QbfError>;
