//! Integration tests for the complete CLI workflow
//!
//! These tests verify end-to-end behavior of the task runners over real
//! files.

use core_types::RunStatus;
use mica_cli::{tasks, Cli, CliError};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn cli_for(task: &str, input: PathBuf, output: PathBuf) -> Cli {
    Cli {
        tokens: task == "tokens",
        symbols: task == "symbols",
        parse: task == "parse",
        no_semantic: false,
        recovery: None,
        input: Some(input),
        output: Some(output),
    }
}

/// Test complete workflow: token mode over a source file
#[test]
fn integration_token_stream_workflow() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("program.mica");
    let output = dir.path().join("tokens.txt");

    fs::write(&input, "var int x;\nx = 40 + 2;\n").unwrap();

    let status = tasks::run(&cli_for("tokens", input, output.clone())).unwrap();
    assert_eq!(status, RunStatus::Clean);

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(
        written,
        "<var, >\n<int, >\n<id, 0>\n<scol, >\n<id, 0>\n<ass, >\n<cint, 40>\n\
         <sum, >\n<cint, 2>\n<scol, >\n<eof, >\n"
    );
}

/// Test symbol mode over a semantic run
#[test]
fn integration_semantic_symbols_workflow() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("program.mica");
    let output = dir.path().join("symbols.txt");

    fs::write(
        &input,
        "function int doble(int n) {\n    return n + n;\n}\nvar int x;\nx = doble(4);\n",
    )
    .unwrap();

    let status = tasks::run(&cli_for("symbols", input, output.clone())).unwrap();
    assert_eq!(status, RunStatus::Clean);

    let written = fs::read_to_string(&output).unwrap();
    // Global table first, blank line, then the function's local table.
    assert_eq!(
        written,
        "#0:\n\
         *'doble'\n\
         +label:'doble'\n\
         +num_params:1\n\
         +param_type_01:'int'\n\
         +return_type:'int'\n\
         +type:'function'\n\
         *'x'\n\
         +offset:0\n\
         +type:'int'\n\
         \n\
         #1:\n\
         *'n'\n\
         +offset:0\n\
         +type:'int'\n\n"
    );
}

/// Test parse mode emits the derivation's production numbers
#[test]
fn integration_parse_trace_workflow() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("program.mica");
    let output = dir.path().join("parse.txt");

    fs::write(&input, "var int x;\n").unwrap();

    let mut cli = cli_for("parse", input, output.clone());
    cli.no_semantic = true;

    let status = tasks::run(&cli).unwrap();
    assert_eq!(status, RunStatus::Clean);

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(written, "D 2 18 7 3\n");
}

/// Test a semantic error yields partial-success status but full output
#[test]
fn integration_semantic_error_is_partial_success() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("program.mica");
    let output = dir.path().join("parse.txt");

    fs::write(&input, "if (1) output 'x';\n").unwrap();

    let status = tasks::run(&cli_for("parse", input, output.clone())).unwrap();
    assert_eq!(status, RunStatus::Recovered);

    let written = fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("D 2 16"), "got {written:?}");
}

/// Test a syntax error aborts with the unrecoverable status
#[test]
fn integration_syntax_error_is_unrecoverable() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("program.mica");
    let output = dir.path().join("parse.txt");

    fs::write(&input, "var int ;\n").unwrap();

    let status = tasks::run(&cli_for("parse", input, output)).unwrap();
    assert_eq!(status, RunStatus::Unrecoverable);
}

/// Test the missing-input-file error path
#[test]
fn integration_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("no-such-file.mica");
    let output = dir.path().join("out.txt");

    let result = tasks::run(&cli_for("tokens", input, output));
    assert!(matches!(result, Err(CliError::InputNotFound(_))));
}

/// Test a lexical-symbols run (no semantics) dumps the untyped table
#[test]
fn integration_lexical_symbols_workflow() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("program.mica");
    let output = dir.path().join("symbols.txt");

    fs::write(&input, "uno dos uno\n").unwrap();

    let mut cli = cli_for("symbols", input, output.clone());
    cli.no_semantic = true;

    let status = tasks::run(&cli).unwrap();
    assert_eq!(status, RunStatus::Clean);

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(written, "#0:\n*'uno'\n*'dos'\n");
}
