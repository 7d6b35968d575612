//! Mica Front End CLI Library
//!
//! Provides the command-line surface and the task runners for the
//! `mica-front` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod tasks;

pub use cli::{Cli, RecoveryArg, Task};
pub use error::{CliError, CliResult};
pub use tasks::run;
