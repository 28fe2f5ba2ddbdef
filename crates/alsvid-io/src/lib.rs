//! Circuit file formats for Alsvid.
//!
//! Two interchangeable persistence formats:
//!
//! - **BLIF** ([`blif`]): a textual netlist with named truth-table gates
//! - **AIGER** ([`aiger`]): binary (`aig`) or ASCII (`aag`) AND-inverter
//!   graphs
//!
//! Both readers produce the same normalised [`alsvid_ir::Circuit`]; both
//! writers accept one. Reader selection by file suffix lives in
//! [`read_circuit`].

pub mod aiger;
pub mod blif;
pub mod error;

use std::path::Path;

pub use aiger::{parse_aiger, read_aiger, write_aiger, write_aiger_file};
pub use blif::{parse_blif, read_blif, write_blif, write_blif_file};
pub use error::{IoError, IoResult};

use alsvid_ir::Circuit;

/// Read a circuit, choosing the reader by file suffix: `.aig` and `.aag`
/// are AIGER, everything else is BLIF. `ordered` promises topologically
/// ordered gates for the BLIF reader.
pub fn read_circuit(path: &Path, ordered: bool) -> IoResult<Circuit> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("aig" | "aag") => read_aiger(path),
        _ => read_blif(path, ordered),
    }
}

/// Write a circuit, choosing the writer by file suffix as [`read_circuit`]
/// does.
pub fn write_circuit(path: &Path, circuit: &Circuit) -> IoResult<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("aig" | "aag") => write_aiger_file(path, circuit),
        _ => write_blif_file(path, circuit, "spec"),
    }
}
