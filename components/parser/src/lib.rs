//! Mica Parser Component
//!
//! Provides the lexer, recursive descent parser, scoped symbol tables and
//! error management for the Mica language front end.
//!
//! # Overview
//!
//! - [`Lexer`] - Tokenizes Mica source code read as a UTF-8 byte stream
//! - [`Token`] - Token types including keywords, operators, literals
//! - [`Parser`] - Recursive descent parser with synthesized type attributes
//! - [`ScopeContext`] - Global and function-local symbol tables
//! - [`ErrorManager`] - Diagnostic reporting, recovery policy, run status
//! - [`Context`] - The per-run state threaded through lexer and parser
//!
//! # Example
//!
//! ```
//! use parser::{Context, Parser, TraceMode};
//!
//! let source = "var int x; x = 2 + 3;";
//! let mut ctx = Context::new(true, TraceMode::None);
//! let mut parser = Parser::new(source.as_bytes());
//! let result = parser.parse(&mut ctx);
//!
//! assert!(result.is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod token;
pub mod types;

pub use context::{Context, TraceMode};
pub use error::{
    ErrorManager, FatalError, LexicalCode, LexicalError, LexicalRecoveryMode, SemanticCode,
    SyntaxCode, SyntaxError,
};
pub use lexer::Lexer;
pub use parser::Parser;
pub use scope::{ScopeContext, Symbol, SymbolRef, SymbolTable};
pub use token::{Token, TokenAttr, TokenKind};
pub use types::TypeValue;
