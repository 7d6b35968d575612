//! Command-line argument surface.

use clap::{ArgGroup, Parser, ValueEnum};
use parser::LexicalRecoveryMode;
use std::path::PathBuf;

/// The task a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Emit the classified token stream
    Tokens,
    /// Emit the accumulated symbol table(s)
    Symbols,
    /// Emit the parse trace
    Parse,
}

/// Lexical recovery policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecoveryArg {
    /// Skip one character and retry
    SkipChar,
    /// Skip to the end of the line and retry
    SkipLine,
    /// Treat any lexical error as unrecoverable
    Critical,
}

impl From<RecoveryArg> for LexicalRecoveryMode {
    fn from(arg: RecoveryArg) -> Self {
        match arg {
            RecoveryArg::SkipChar => LexicalRecoveryMode::SkipChar,
            RecoveryArg::SkipLine => LexicalRecoveryMode::SkipLine,
            RecoveryArg::Critical => LexicalRecoveryMode::Critical,
        }
    }
}

/// Mica language front end.
///
/// Reads a Mica program and emits one of: its token stream, its symbol
/// table(s), or its parse trace.
#[derive(Parser, Debug)]
#[command(name = "mica-front", version, about)]
#[command(group(ArgGroup::new("task").required(true)))]
pub struct Cli {
    /// Emit the token stream
    #[arg(short = 't', long, group = "task")]
    pub tokens: bool,

    /// Emit the symbol table(s)
    #[arg(short = 's', long, group = "task")]
    pub symbols: bool,

    /// Emit the parse trace
    #[arg(short = 'p', long, group = "task")]
    pub parse: bool,

    /// Skip the type-rule layer (syntax-only run)
    #[arg(long)]
    pub no_semantic: bool,

    /// Lexical recovery policy (default: skip-char for token runs,
    /// skip-line otherwise)
    #[arg(long, value_enum)]
    pub recovery: Option<RecoveryArg>,

    /// Input file (standard input when omitted)
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Output file (defaults: tokens.txt, symbols.txt, or standard
    /// output for the parse trace)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// The selected task, if any.
    pub fn task(&self) -> Option<Task> {
        if self.tokens {
            Some(Task::Tokens)
        } else if self.symbols {
            Some(Task::Symbols)
        } else if self.parse {
            Some(Task::Parse)
        } else {
            None
        }
    }

    /// The effective recovery policy for the selected task.
    pub fn recovery_mode(&self) -> LexicalRecoveryMode {
        match self.recovery {
            Some(arg) => arg.into(),
            None => match self.task() {
                Some(Task::Tokens) => LexicalRecoveryMode::SkipChar,
                _ => LexicalRecoveryMode::SkipLine,
            },
        }
    }
}
