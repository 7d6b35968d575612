//! Error types for the CLI.

use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The input file does not exist or cannot be opened
    #[error("no such input file \"{}\"", .0.display())]
    InputNotFound(PathBuf),

    /// No task flag was given
    #[error("a task must be specified: --tokens, --symbols or --parse")]
    MissingTask,

    /// File I/O error
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
