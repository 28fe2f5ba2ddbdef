//! Alsvid circuit intermediate representation.
//!
//! This crate provides the core data structures for representing
//! combinational Boolean circuits in Alsvid. It forms the foundation of the
//! reduction stack.
//!
//! # Overview
//!
//! A circuit is a normalised, topologically ordered DAG of gates described
//! by truth tables. Gates and primary inputs are addressed by stable integer
//! *aliases*; the arena-of-maps layout keeps all references as indices, so
//! no owning cycles exist.
//!
//! # Core components
//!
//! - [`TruthTable`]: bit vectors of length `2^k` with the first listed
//!   input as the most significant row-index bit
//! - [`Gate`]: one Boolean node with ordered inputs and its table;
//!   [`Cover`] is its two-level form used by the QBF encoders
//! - [`Circuit`]: the mutable DAG with subcircuit extraction, splicing,
//!   constant folding and dead-gate removal
//!
//! # Example: a three-input AND from two gates
//!
//! ```rust
//! use alsvid_ir::{Circuit, TruthTable};
//!
//! let and2 = TruthTable::from_rows(&[false, false, false, true]);
//! let mut circuit = Circuit::new(vec![1, 2, 3], vec![11]);
//! circuit.add_gate(10, vec![1, 2], and2.clone()).unwrap();
//! circuit.add_gate(11, vec![10, 3], and2).unwrap();
//! circuit.init(true).unwrap();
//!
//! assert_eq!(circuit.gate_count(), 2);
//! assert_eq!(circuit.evaluate(&[true, true, true]).unwrap(), vec![true]);
//! ```

pub mod circuit;
pub mod error;
pub mod gate;
pub mod table;

pub use circuit::Circuit;
pub use error::{IrError, IrResult};
pub use gate::{Cover, Gate};
pub use table::{TruthTable, bit_seq};
