//! Mica Front End CLI
//!
//! Entry point for the `mica-front` binary. Parses CLI arguments and
//! delegates to the task runners.

use clap::Parser as ClapParser;
use mica_cli::{Cli, CliError};
use std::process;

fn main() {
    let cli = Cli::parse();

    match mica_cli::run(&cli) {
        Ok(status) => process::exit(status.code()),
        Err(error @ CliError::InputNotFound(_)) => {
            eprintln!("{error}");
            process::exit(1);
        }
        Err(error) => {
            eprintln!("unexpected error: {error}");
            process::exit(3);
        }
    }
}
