//! CLI argument parsing tests
//!
//! Tests for verifying clap argument parsing works correctly.

use clap::Parser as ClapParser;
use mica_cli::{Cli, RecoveryArg, Task};
use parser::LexicalRecoveryMode;
use std::path::PathBuf;

/// Test parsing the tokens task (short form)
#[test]
fn cli_parse_tokens_short() {
    let args = vec!["mica-front", "-t"];
    let cli = Cli::try_parse_from(args).unwrap();

    assert_eq!(cli.task(), Some(Task::Tokens));
    assert!(!cli.no_semantic);
    assert_eq!(cli.input, None);
    assert_eq!(cli.output, None);
}

/// Test parsing the symbols task (long form)
#[test]
fn cli_parse_symbols_long() {
    let args = vec!["mica-front", "--symbols"];
    let cli = Cli::try_parse_from(args).unwrap();

    assert_eq!(cli.task(), Some(Task::Symbols));
}

/// Test parsing the parse task
#[test]
fn cli_parse_parse_task() {
    let args = vec!["mica-front", "-p"];
    let cli = Cli::try_parse_from(args).unwrap();

    assert_eq!(cli.task(), Some(Task::Parse));
}

/// Test that a task flag is required
#[test]
fn cli_requires_a_task() {
    let args = vec!["mica-front"];
    assert!(Cli::try_parse_from(args).is_err());
}

/// Test that task flags are mutually exclusive
#[test]
fn cli_rejects_two_tasks() {
    let args = vec!["mica-front", "-t", "-p"];
    assert!(Cli::try_parse_from(args).is_err());
}

/// Test parsing input and output files
#[test]
fn cli_parse_io_files() {
    let args = vec!["mica-front", "-p", "-i", "program.mica", "-o", "out.txt"];
    let cli = Cli::try_parse_from(args).unwrap();

    assert_eq!(cli.input, Some(PathBuf::from("program.mica")));
    assert_eq!(cli.output, Some(PathBuf::from("out.txt")));
}

/// Test parsing --no-semantic
#[test]
fn cli_parse_no_semantic() {
    let args = vec!["mica-front", "-p", "--no-semantic"];
    let cli = Cli::try_parse_from(args).unwrap();

    assert!(cli.no_semantic);
}

/// Test parsing --recovery values
#[test]
fn cli_parse_recovery() {
    let args = vec!["mica-front", "-t", "--recovery", "skip-line"];
    let cli = Cli::try_parse_from(args).unwrap();

    assert_eq!(cli.recovery, Some(RecoveryArg::SkipLine));
    assert_eq!(cli.recovery_mode(), LexicalRecoveryMode::SkipLine);
}

/// Test the per-task recovery defaults
#[test]
fn cli_recovery_defaults() {
    let tokens = Cli::try_parse_from(vec!["mica-front", "-t"]).unwrap();
    assert_eq!(tokens.recovery_mode(), LexicalRecoveryMode::SkipChar);

    let symbols = Cli::try_parse_from(vec!["mica-front", "-s"]).unwrap();
    assert_eq!(symbols.recovery_mode(), LexicalRecoveryMode::SkipLine);

    let parse = Cli::try_parse_from(vec!["mica-front", "-p"]).unwrap();
    assert_eq!(parse.recovery_mode(), LexicalRecoveryMode::SkipLine);
}
