//! The per-run state threaded through the lexer and parser.

use crate::error::ErrorManager;
use crate::scope::{ScopeContext, SymbolRef};

/// What the parser writes to its output buffer while recognizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceMode {
    /// No trace output
    #[default]
    None,
    /// The production number of every fired grammar alternative
    Productions,
    /// The symbol-table dump of every scope as it closes
    Tables,
}

/// The mutable state of one front-end run.
///
/// Owned by the driver and passed by mutable reference through every
/// lexer call and grammar rule; there is no ambient or static state.
pub struct Context {
    /// Diagnostic reporting and run status
    pub errors: ErrorManager,
    /// Global and function-local symbol tables
    pub scopes: ScopeContext,
    /// Whether the type-rule layer runs
    pub semantic: bool,
    /// What the parser traces
    pub trace: TraceMode,
}

impl Context {
    /// Create a fresh run context with default error reporting (stderr).
    pub fn new(semantic: bool, trace: TraceMode) -> Self {
        Self {
            errors: ErrorManager::new(),
            scopes: ScopeContext::new(),
            semantic,
            trace,
        }
    }

    /// Resolve an identifier the lexer scanned, declaring it when
    /// unknown (see [`ScopeContext::resolve_identifier`]).
    pub fn resolve_identifier(&mut self, lexeme: &str) -> SymbolRef {
        self.scopes.resolve_identifier(lexeme, self.semantic)
    }
}
