//! QBF exact synthesis for Alsvid.
//!
//! This crate turns "does a *k*-gate circuit equivalent to this subcircuit
//! exist?" into a two-alternation circuit QBF and drives an external solver
//! over it.
//!
//! # Core components
//!
//! - [`QcirWriter`]: streaming QCIR-G14 output
//! - [`Encoder`] over a [`SpecSource`]: the encoding itself; [`HostSpec`]
//!   embeds the subcircuit in its host circuit (with acyclicity constraints
//!   against feedback paths), [`IsolatedSpec`] matches a bare gate list
//! - [`solve`]: the solver driver with per-call timeouts and certificate
//!   parsing
//! - [`miter::equivalent`]: the equivalence oracle for replacement logging

pub mod encoder;
pub mod error;
pub mod exact;
pub mod host;
pub mod miter;
pub mod qcir;
pub mod solver;

pub use encoder::{Encoder, EncoderOptions, EncodingLayout, SpecSource};
pub use error::{QbfError, QbfResult};
pub use exact::IsolatedSpec;
pub use host::HostSpec;
pub use qcir::QcirWriter;
pub use solver::{Assignment, QbfSolver, SolverOutcome, SolverRun, solve};
