//! The Alsvid reduction stack.
//!
//! Glues the IR, the formats and the QBF layer into the minimiser proper:
//!
//! - [`Config`]: every tunable of a session, solver and ABC paths included
//! - [`TimeManager`]: per-size timeouts with dynamic adaptation
//! - [`Synthesiser`]: drives the encoder across decreasing target sizes
//!   and splices certificates back into the circuit
//! - [`Reduction`]: the randomised, taboo-guided reduction loop
//! - [`Session`]: multi-restart driver with optional ABC interleaving

pub mod abc;
pub mod config;
pub mod error;
pub mod reduction;
pub mod session;
pub mod synthesiser;
pub mod timeouts;

pub use config::{Config, SearchStrategy, SynthesisMode};
pub use error::{SynthError, SynthResult};
pub use reduction::{Budget, Reduction};
pub use session::Session;
pub use synthesiser::{ReduceOutcome, ReplacementInfo, Synthesiser};
pub use timeouts::TimeManager;
