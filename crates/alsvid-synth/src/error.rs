//! Error types for the synthesis layer.

use thiserror::Error;

/// Errors raised while driving the reduction.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SynthError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The circuit broke an invariant.
    #[error(transparent)]
    Ir(#[from] alsvid_ir::IrError),

    /// Reading or writing a circuit file failed.
    #[error(transparent)]
    Format(#[from] alsvid_io::IoError),

    /// Encoding or solver failure.
    #[error(transparent)]
    Qbf(#[from] alsvid_qbf::QbfError),

    /// The circuit has fewer inputs than the target gate fan-in.
    #[error("circuit has {available} inputs but synthesised gates take {required}")]
    NotEnoughInputs {
        /// Inputs available.
        available: usize,
        /// Required gate fan-in.
        required: usize,
    },

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for the synthesis layer.
pub type SynthResult<T> = Result<T, SynthError>;
