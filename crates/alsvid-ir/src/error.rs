//! Error types for the IR crate.

use thiserror::Error;

/// Errors that can occur in circuit operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// A gate input references an alias that is neither a primary input
    /// nor a gate of the circuit.
    #[error("alias {alias} referenced by gate {referent} is not defined in the circuit")]
    UndefinedAlias {
        /// The missing alias.
        alias: u32,
        /// The gate that referenced it.
        referent: u32,
    },

    /// A gate alias was added twice.
    #[error("gate alias {0} is already defined")]
    DuplicateGate(u32),

    /// Truth table length does not match the gate fan-in.
    #[error("gate {alias}: table of {table_len} rows does not fit {arity} inputs")]
    TableArityMismatch {
        /// The offending gate.
        alias: u32,
        /// Number of declared inputs.
        arity: usize,
        /// Length of the supplied table.
        table_len: usize,
    },

    /// A gate table is true on the all-false input row.
    #[error("gate {0}: table is not normalised (bit 0 must be 0)")]
    DenormalisedTable(u32),

    /// The ingested circuit contains a cycle.
    #[error("cycle detected in circuit graph")]
    CycleDetected,

    /// Simulation was given the wrong number of input values.
    #[error("evaluation requires {expected} input values, got {got}")]
    InputCountMismatch {
        /// Number of primary inputs.
        expected: usize,
        /// Number of supplied values.
        got: usize,
    },
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
