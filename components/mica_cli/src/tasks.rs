//! The three task runners behind the CLI: token stream, symbol tables,
//! parse trace.

use crate::cli::{Cli, Task};
use crate::error::{CliError, CliResult};
use core_types::RunStatus;
use parser::{Context, Lexer, LexicalRecoveryMode, Parser, TokenKind, TraceMode};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

fn log_critical_error() {
    eprintln!("critical error: unrecoverable failure while processing the input");
}

fn open_input(path: Option<&PathBuf>) -> CliResult<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file =
                File::open(path).map_err(|_| CliError::InputNotFound(path.clone()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(path: Option<&PathBuf>, default_name: Option<&str>) -> CliResult<Box<dyn Write>> {
    match (path, default_name) {
        (Some(path), _) => Ok(Box::new(File::create(path)?)),
        (None, Some(name)) => Ok(Box::new(File::create(name)?)),
        (None, None) => Ok(Box::new(io::stdout())),
    }
}

/// Emit one `<kind, attribute>` line per token until end of input.
pub fn generate_tokens(
    input: Box<dyn BufRead>,
    output: &mut dyn Write,
    recovery: LexicalRecoveryMode,
) -> CliResult<RunStatus> {
    let mut ctx = Context::new(false, TraceMode::None);
    ctx.errors.set_lexical_recovery_mode(recovery);
    let mut lexer = Lexer::new(input);

    loop {
        match lexer.get_token(&mut ctx) {
            Ok(token) => {
                writeln!(
                    output,
                    "<{}, {}>",
                    token.kind.mnemonic(),
                    token.rendered_attribute()
                )?;
                if token.kind == TokenKind::End {
                    break;
                }
            }
            Err(_) => {
                log_critical_error();
                break;
            }
        }
    }

    Ok(ctx.errors.status())
}

/// Emit the symbol table(s): the global table of a plain lexical run, or
/// the global table followed by the per-function dumps of a full
/// semantic parse.
pub fn generate_symbols(
    input: Box<dyn BufRead>,
    output: &mut dyn Write,
    semantic: bool,
    recovery: LexicalRecoveryMode,
) -> CliResult<RunStatus> {
    if semantic {
        let mut ctx = Context::new(true, TraceMode::Tables);
        ctx.errors.set_lexical_recovery_mode(recovery);
        let mut parser = Parser::new(input);

        if parser.parse(&mut ctx).is_err() {
            log_critical_error();
        }

        write!(output, "{}", ctx.scopes.global().serialize())?;
        writeln!(output)?;
        write!(output, "{}", parser.output())?;

        Ok(ctx.errors.status())
    } else {
        let mut ctx = Context::new(false, TraceMode::None);
        ctx.errors.set_lexical_recovery_mode(recovery);
        let mut lexer = Lexer::new(input);

        loop {
            match lexer.get_token(&mut ctx) {
                Ok(token) if token.kind == TokenKind::End => break,
                Ok(_) => {}
                Err(_) => {
                    log_critical_error();
                    break;
                }
            }
        }

        write!(output, "{}", ctx.scopes.global().serialize())?;
        Ok(ctx.errors.status())
    }
}

/// Emit the parse trace: the production number of every derivation step,
/// interleaved with per-function table dumps in a semantic run.
pub fn generate_parse(
    input: Box<dyn BufRead>,
    output: &mut dyn Write,
    semantic: bool,
    recovery: LexicalRecoveryMode,
) -> CliResult<RunStatus> {
    let mut ctx = Context::new(semantic, TraceMode::Productions);
    ctx.errors.set_lexical_recovery_mode(recovery);
    let mut parser = Parser::new(input);

    if parser.parse(&mut ctx).is_err() {
        log_critical_error();
    }

    writeln!(output, "D{}", parser.output())?;
    Ok(ctx.errors.status())
}

/// Run the task the CLI selected and return the aggregate status.
pub fn run(cli: &Cli) -> CliResult<RunStatus> {
    let task = cli.task().ok_or(CliError::MissingTask)?;
    let input = open_input(cli.input.as_ref())?;
    let recovery = cli.recovery_mode();
    let semantic = !cli.no_semantic;

    match task {
        Task::Tokens => {
            let mut output = open_output(cli.output.as_ref(), Some("tokens.txt"))?;
            generate_tokens(input, output.as_mut(), recovery)
        }
        Task::Symbols => {
            let mut output = open_output(cli.output.as_ref(), Some("symbols.txt"))?;
            generate_symbols(input, output.as_mut(), semantic, recovery)
        }
        Task::Parse => {
            let mut output = open_output(cli.output.as_ref(), None)?;
            generate_parse(input, output.as_mut(), semantic, recovery)
        }
    }
}
