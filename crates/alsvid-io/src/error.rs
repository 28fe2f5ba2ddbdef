//! Error types for the format readers and writers.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing circuit files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IoError {
    /// The input does not match the format grammar.
    #[error("{}:{line}: {message}", display_path(.path))]
    Parse {
        /// Source file, when reading from disk.
        path: Option<PathBuf>,
        /// 1-based line of the offending construct.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// The file declares no primary outputs.
    #[error("{}: circuit declares no outputs", display_path(.path))]
    NoOutputs {
        /// Source file, when reading from disk.
        path: Option<PathBuf>,
    },

    /// A format feature outside the combinational subset.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// The ingested circuit is structurally broken.
    #[error(transparent)]
    Ir(#[from] alsvid_ir::IrError),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Helper to format the optional source path.
#[allow(clippy::ref_option)]
fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => "<input>".into(),
    }
}

/// Result type for reader/writer operations.
pub type IoResult<T> = Result<T, IoError>;
