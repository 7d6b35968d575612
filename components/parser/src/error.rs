//! Error taxonomy and diagnostic reporting.
//!
//! Three severities with distinct recovery policies:
//! - **Lexical** errors are recovered according to the configured policy
//!   (skip one character, skip to end of line, or escalate), bounded by
//!   the lexer's retry ceiling.
//! - **Syntax** errors are always unrecoverable: one diagnostic, the
//!   parse stops.
//! - **Semantic** errors are always recovered: the diagnostic is logged,
//!   the synthesized type is poisoned and parsing continues.
//!
//! Reported lines have the form `({line}:{column}) XX-CODE: message`,
//! with `XX` one of `LE`/`SE`/`UE` and `CODE` four hex digits, followed
//! by a caret hint under the offending source line when one is available.

use crate::token::Token;
use core_types::codec::encode_codepoint;
use core_types::{RunStatus, SourcePosition};
use std::io::{self, Write};

/// Raised when processing cannot continue. The diagnostic has already
/// been reported through the [`ErrorManager`] by the time this value
/// exists, so it carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatalError;

/// Lexical error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LexicalCode {
    /// `/` not followed by `*`
    MissingCommentStart = 0x0000,
    /// End of input inside a block comment
    MissingCommentEnd = 0x0001,
    /// End of input inside a string literal
    MissingStringEnd = 0x0010,
    /// `&` not followed by `&`
    MissingOpAnd = 0x0020,
    /// `|` not followed by `|`
    MissingOpOr = 0x0021,
    /// Non-printable character inside a string literal
    StringForbiddenCharacter = 0x0100,
    /// Unknown escape sequence inside a string literal
    StringEscapeSequence = 0x0101,
    /// String literal longer than 64 characters
    StringTooLong = 0x0102,
    /// Integer literal beyond 32767
    IntTooBig = 0x0200,
    /// No token starts with this character
    UnexpectedStartCharacter = 0xFF00,
}

/// Render a codepoint for a diagnostic: `'c' (U+0041)` when printable,
/// `(U+0001)` otherwise.
fn display_codepoint(codepoint: u32) -> String {
    match char::from_u32(codepoint).filter(|c| !c.is_control()) {
        Some(_) => format!("'{}' (U+{codepoint:04X})", encode_codepoint(codepoint)),
        None => format!("(U+{codepoint:04X})"),
    }
}

/// A malformed-token diagnostic raised by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalError {
    /// The error code
    pub code: LexicalCode,
    /// Line where the error was detected
    pub line: u32,
    /// Column where the error was detected
    pub column: u32,
    /// The offending codepoint, when one exists
    pub character: Option<u32>,
}

impl LexicalError {
    /// The diagnostic message.
    pub fn message(&self) -> String {
        use LexicalCode::*;

        match self.code {
            MissingCommentStart => {
                "Unexpected character after '/'. Expected '*' to open a block comment.".to_string()
            }
            MissingCommentEnd => {
                "Unexpected end of input. Expected '*/' to close the block comment.".to_string()
            }
            MissingStringEnd => {
                "Unexpected end of input. Expected \"'\" to close the string.".to_string()
            }
            MissingOpAnd => "Expected '&' after '&' to form an operator.".to_string(),
            MissingOpOr => "Expected '|' after '|' to form an operator.".to_string(),
            StringForbiddenCharacter => match self.character {
                Some(c) => format!("Invalid string. Character not allowed {}.", display_codepoint(c)),
                None => "Invalid string. Character not allowed.".to_string(),
            },
            StringEscapeSequence => match self.character {
                Some(c) => {
                    let shown = match char::from_u32(c).filter(|ch| !ch.is_control()) {
                        Some(_) => encode_codepoint(c),
                        None => "\u{FFFD}".to_string(),
                    };
                    format!(
                        "Invalid string. The escape sequence '\\{shown}' (U+{c:04X}) is not valid."
                    )
                }
                None => "Invalid string. Unexpected end of input in an escape sequence.".to_string(),
            },
            StringTooLong => "String length exceeds the 64 character limit.".to_string(),
            IntTooBig => "Integer value is too big (maximum 32767).".to_string(),
            UnexpectedStartCharacter => match self.character {
                Some(c) => format!(
                    "Unexpected character while scanning for the next token {}.",
                    display_codepoint(c)
                ),
                None => "Unexpected character while scanning for the next token.".to_string(),
            },
        }
    }
}

/// Syntax error codes: one per production and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyntaxCode {
    /// Token cannot start a top-level element
    TopLevelInvalid = 0x0100,
    /// Missing function name
    FunctionMissingIdentifier = 0x0210,
    /// Missing `(` after the function name
    FunctionMissingParenOpen = 0x0211,
    /// Missing `)` after the parameter list
    FunctionMissingParenClose = 0x0212,
    /// Missing `{` before the function body
    FunctionMissingBraceOpen = 0x0213,
    /// Missing `}` after the function body
    FunctionMissingBraceClose = 0x0214,
    /// Token is not a function return type
    FunTypeInvalid = 0x0300,
    /// Token is not a variable type
    VarTypeInvalid = 0x0400,
    /// `void` used as a variable type
    VarTypeVoid = 0x0410,
    /// Token cannot start a parameter list
    FunParamsInvalid = 0x0500,
    /// Empty parameter list (must be `void`)
    FunParamsEmpty = 0x0510,
    /// Missing parameter name after its type
    FunParamsMissingIdentifier = 0x0520,
    /// Token cannot start a statement
    StatementInvalid = 0x0600,
    /// Missing `;` after a statement
    StatementMissingSemicolon = 0x0610,
    /// Missing `(` after `if`
    IfMissingParenOpen = 0x0620,
    /// Missing `)` after the `if` condition
    IfMissingParenClose = 0x0621,
    /// Missing `(` after `for`
    ForMissingParenOpen = 0x0630,
    /// Missing `;` between `for` arguments
    ForMissingSemicolon = 0x0631,
    /// Missing `)` after the `for` arguments
    ForMissingParenClose = 0x0632,
    /// Missing `{` before the `for` body
    ForMissingBraceOpen = 0x0633,
    /// Missing `}` after the `for` body
    ForMissingBraceClose = 0x0634,
    /// Missing variable name after its type
    VarMissingIdentifier = 0x0640,
    /// Missing identifier after `input`
    InputMissingIdentifier = 0x0650,
    /// Identifier not followed by an assignment or a call
    IdActInvalid = 0x0700,
    /// Missing `)` closing a call
    CallMissingParenClose = 0x0710,
    /// Token is not an assignment operator
    AssignInvalid = 0x0800,
    /// Token cannot start an expression
    ExpInvalid = 0x0900,
    /// Missing `)` closing a parenthesized expression
    ExpMissingParenClose = 0x0901,
    /// Token is not a comparison operator
    CompareInvalid = 0x0A00,
    /// Token is not an arithmetic operator
    ArithInvalid = 0x0B00,
}

/// A grammar-violation diagnostic. Always unrecoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// The error code
    pub code: SyntaxCode,
    /// The offending token
    pub token: Token,
}

impl SyntaxError {
    /// Build a syntax error at the given token.
    pub fn new(code: SyntaxCode, token: Token) -> Self {
        Self { code, token }
    }

    /// The diagnostic message.
    pub fn message(&self) -> String {
        use SyntaxCode::*;

        let got = self.token.kind.display_name();

        match self.code {
            TopLevelInvalid => format!(
                "Unexpected {got} at the top level. Expected a function declaration or a \
                 top-level statement."
            ),
            FunctionMissingIdentifier => {
                format!("Unexpected {got} as a function name. Expected a valid identifier.")
            }
            FunctionMissingParenOpen => format!(
                "Unexpected {got}. Expected '(' after the function name to define its parameters."
            ),
            FunctionMissingParenClose => {
                format!("Unexpected {got}. Expected ')' to finish the parameter list.")
            }
            FunctionMissingBraceOpen => format!(
                "Unexpected {got}. Expected '{{' after the parameters to define the function body."
            ),
            FunctionMissingBraceClose => {
                format!("Unexpected {got}. Expected '}}' to finish the function body.")
            }
            FunTypeInvalid => format!(
                "Unexpected {got}. Expected the function return type ('int', 'boolean', \
                 'string' or 'void')."
            ),
            VarTypeInvalid => format!(
                "Unexpected {got}. Expected a valid variable type ('int', 'boolean' or 'string')."
            ),
            VarTypeVoid => "A variable cannot be of type 'void'. Expected a valid type ('int', \
                            'boolean' or 'string')."
                .to_string(),
            FunParamsInvalid => {
                format!("Unexpected {got}. Expected a type to start the parameter list.")
            }
            FunParamsEmpty => "The function needs a parameter list, or 'void' if it takes no \
                               arguments."
                .to_string(),
            FunParamsMissingIdentifier => {
                format!("Unexpected {got}. Expected the parameter name after its type.")
            }
            StatementInvalid => format!(
                "Unexpected {got}. Expected a valid statement (e.g. 'if', 'for', 'input' or an \
                 assignment)."
            ),
            StatementMissingSemicolon => {
                format!("Unexpected {got}. Expected ';' to finish the statement.")
            }
            IfMissingParenOpen => {
                format!("Unexpected {got}. Expected '(' after 'if' to define the condition.")
            }
            IfMissingParenClose => {
                format!("Unexpected {got}. Expected ')' after the 'if' condition.")
            }
            ForMissingParenOpen => {
                format!("Unexpected {got}. Expected '(' after 'for' to define its arguments.")
            }
            ForMissingSemicolon => {
                format!("Unexpected {got}. Expected ';' between the 'for' arguments.")
            }
            ForMissingParenClose => {
                format!("Unexpected {got}. Expected ')' after the 'for' arguments.")
            }
            ForMissingBraceOpen => {
                format!("Unexpected {got}. Expected '{{' after the arguments to define the \
                         'for' body.")
            }
            ForMissingBraceClose => {
                format!("Unexpected {got}. Expected '}}' to finish the 'for' body.")
            }
            VarMissingIdentifier => {
                format!("Unexpected {got}. Expected an identifier after the variable type.")
            }
            InputMissingIdentifier => {
                format!("Unexpected {got}. Expected an identifier to receive the input.")
            }
            IdActInvalid => format!(
                "Unexpected {got}. The identifier must be assigned to or called."
            ),
            CallMissingParenClose => {
                format!("Unexpected {got}. Missing ')' to finish the function call.")
            }
            AssignInvalid => {
                format!("Unexpected {got}. Expected '=' or '+=' for the assignment.")
            }
            ExpInvalid => {
                format!("Unexpected {got}. An expression formed like this is not valid.")
            }
            ExpMissingParenClose => {
                format!("Unexpected {got}. Expected ')' to finish the expression.")
            }
            CompareInvalid => {
                format!("Unexpected {got}. Expected '<' or '>' for the comparison.")
            }
            ArithInvalid => {
                format!("Unexpected {got}. Expected '+' or '-' for the arithmetic operation.")
            }
        }
    }
}

/// Semantic error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SemanticCode {
    /// Declaring a name that already carries a type in the applicable scope
    IdentifierAlreadyExists = 0x0100,
    /// Two types that were required to agree do not
    IncoherentTypes = 0x0200,
    /// Call argument types do not match the declaration
    IncoherentCallParamTypes = 0x0210,
    /// Calling an identifier that is not a function
    VariableCalledAsFunction = 0x0220,
    /// Using a function identifier as a variable
    FunctionUsedAsVariable = 0x0221,
    /// An operand or expression has a type its context rejects
    InvalidType = 0x0300,
    /// Function body returns a type other than the declared one
    InvalidReturnType = 0x0310,
    /// `if` condition is not boolean
    InvalidIfConditionType = 0x0320,
    /// `for` condition is not boolean
    InvalidForConditionType = 0x0321,
    /// `for` induction variable is not int
    InvalidForActionType = 0x0322,
    /// `output` argument is neither int nor string
    InvalidOutputType = 0x0330,
    /// `input` target is neither int nor string
    InvalidInputType = 0x0331,
}

/// An error that unwinds the recursive-descent call chain to the parse
/// entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAbort {
    /// A grammar violation; reported at the entry point
    Syntax(SyntaxError),
    /// Already reported, nothing more to do
    Fatal(FatalError),
}

impl From<FatalError> for ParseAbort {
    fn from(fatal: FatalError) -> Self {
        ParseAbort::Fatal(fatal)
    }
}

/// The recovery policy applied after a lexical error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexicalRecoveryMode {
    /// Skip one character and retry
    #[default]
    SkipChar,
    /// Skip to the end of the line and retry
    SkipLine,
    /// Escalate to an unrecoverable condition
    Critical,
}

/// The recovery action the lexer must apply before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexicalRecovery {
    /// Skip one character
    SkipChar,
    /// Skip to the end of the line
    SkipLine,
}

/// Classifies and reports diagnostics, applies the configured recovery
/// policy, and accumulates the run status.
///
/// Diagnostics are written to the configured sink (standard error by
/// default) as they are reported; nothing is stored beyond the
/// aggregate status.
pub struct ErrorManager {
    lexical_mode: LexicalRecoveryMode,
    status: RunStatus,
    sink: Box<dyn Write>,
}

impl Default for ErrorManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorManager {
    /// Create a manager reporting to standard error.
    pub fn new() -> Self {
        Self::with_sink(Box::new(io::stderr()))
    }

    /// Create a manager reporting to the given sink.
    pub fn with_sink(sink: Box<dyn Write>) -> Self {
        Self {
            lexical_mode: LexicalRecoveryMode::default(),
            status: RunStatus::Clean,
            sink,
        }
    }

    /// Configure the lexical recovery policy for this run.
    pub fn set_lexical_recovery_mode(&mut self, mode: LexicalRecoveryMode) {
        self.lexical_mode = mode;
    }

    /// The accumulated run status.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    fn write_line(&mut self, line: &str) {
        // Diagnostics are best-effort; a failing sink must not abort the run.
        let _ = writeln!(self.sink, "{line}");
    }

    fn write_header(&mut self, prefix: &str, code: u32, position: SourcePosition, message: &str) {
        self.write_line(&format!(
            "({}:{}) {prefix}-{code:04X}: {message}",
            position.line, position.column
        ));
    }

    /// Write the caret hint under a copy of the offending source line.
    fn write_hint(&mut self, source_line: &str, column: u32, length: u32) {
        let mut carets = String::new();
        for _ in 1..column {
            carets.push(' ');
        }
        for _ in 0..length {
            carets.push('^');
        }

        self.write_line(&format!(" ->   {source_line}"));
        self.write_line(&format!("      {carets}"));
    }

    /// Report a lexical error and decide the recovery action.
    ///
    /// Returns the action the lexer must apply before retrying, or
    /// [`FatalError`] under the `Critical` policy.
    pub fn report_lexical(
        &mut self,
        error: &LexicalError,
        source_line: &str,
    ) -> Result<LexicalRecovery, FatalError> {
        let position = SourcePosition {
            line: error.line,
            column: error.column,
        };
        self.write_header("LE", error.code as u32, position, &error.message());
        self.write_hint(source_line, error.column, 1);

        match self.lexical_mode {
            LexicalRecoveryMode::Critical => {
                self.status.escalate(RunStatus::Unrecoverable);
                Err(FatalError)
            }
            LexicalRecoveryMode::SkipChar => {
                self.status.escalate(RunStatus::Recovered);
                Ok(LexicalRecovery::SkipChar)
            }
            LexicalRecoveryMode::SkipLine => {
                self.status.escalate(RunStatus::Recovered);
                Ok(LexicalRecovery::SkipLine)
            }
        }
    }

    /// Report a syntax error. The parse does not continue past this.
    pub fn report_syntax(&mut self, error: &SyntaxError, source_line: &str) {
        self.write_header(
            "SE",
            error.code as u32,
            error.token.position(),
            &error.message(),
        );
        self.write_hint(source_line, error.token.column, error.token.length.max(1));

        self.status.escalate(RunStatus::Unrecoverable);
    }

    /// Report a semantic error. Parsing continues; the caller poisons the
    /// synthesized type.
    pub fn report_semantic(
        &mut self,
        code: SemanticCode,
        position: SourcePosition,
        length: u32,
        message: &str,
        source_line: &str,
    ) {
        self.write_header("UE", code as u32, position, message);
        if length > 0 {
            self.write_hint(source_line, position.column, length);
        }

        self.status.escalate(RunStatus::Recovered);
    }

    /// Report a plain closing note (no position, no code).
    pub fn report_note(&mut self, message: &str) {
        self.write_line(message);
        self.status.escalate(RunStatus::Recovered);
    }

    /// Escalate to the unrecoverable status, e.g. when the lexical retry
    /// ceiling is exceeded.
    pub fn fatal(&mut self) -> FatalError {
        self.status.escalate(RunStatus::Unrecoverable);
        FatalError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedSink {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn manager_with_sink() -> (ErrorManager, SharedSink) {
        let sink = SharedSink::default();
        let manager = ErrorManager::with_sink(Box::new(sink.clone()));
        (manager, sink)
    }

    #[test]
    fn test_lexical_report_format_and_status() {
        let (mut manager, sink) = manager_with_sink();
        let error = LexicalError {
            code: LexicalCode::IntTooBig,
            line: 3,
            column: 9,
            character: None,
        };
        let action = manager.report_lexical(&error, "x = 99999;").unwrap();

        assert_eq!(action, LexicalRecovery::SkipChar);
        assert_eq!(manager.status(), RunStatus::Recovered);
        let output = sink.contents();
        assert!(output.starts_with("(3:9) LE-0200:"), "got {output:?}");
        assert!(output.contains(" ->   x = 99999;"));
    }

    #[test]
    fn test_lexical_critical_mode() {
        let (mut manager, _sink) = manager_with_sink();
        manager.set_lexical_recovery_mode(LexicalRecoveryMode::Critical);
        let error = LexicalError {
            code: LexicalCode::UnexpectedStartCharacter,
            line: 1,
            column: 1,
            character: Some(u32::from(b'#')),
        };

        assert_eq!(manager.report_lexical(&error, "#"), Err(FatalError));
        assert_eq!(manager.status(), RunStatus::Unrecoverable);
    }

    #[test]
    fn test_semantic_report_keeps_parsing_status() {
        let (mut manager, sink) = manager_with_sink();
        manager.report_semantic(
            SemanticCode::InvalidIfConditionType,
            SourcePosition { line: 2, column: 5 },
            1,
            "The 'if' argument must be of type 'boolean'.",
            "if (1) { }",
        );

        assert_eq!(manager.status(), RunStatus::Recovered);
        let output = sink.contents();
        assert!(output.starts_with("(2:5) UE-0320:"), "got {output:?}");
        assert!(output.contains("      ^"));
    }

    #[test]
    fn test_syntax_report_is_unrecoverable() {
        let (mut manager, sink) = manager_with_sink();
        let error = SyntaxError::new(SyntaxCode::IfMissingParenOpen, Token {
            kind: crate::token::TokenKind::Semicolon,
            line: 1,
            column: 4,
            length: 1,
            attr: crate::token::TokenAttr::Empty,
        });
        manager.report_syntax(&error, "if ;");

        assert_eq!(manager.status(), RunStatus::Unrecoverable);
        assert!(sink.contents().starts_with("(1:4) SE-0620:"));
    }

    #[test]
    fn test_caret_alignment() {
        let (mut manager, sink) = manager_with_sink();
        manager.report_semantic(
            SemanticCode::IncoherentTypes,
            SourcePosition { line: 1, column: 5 },
            3,
            "message",
            "a = b+c",
        );

        let output = sink.contents();
        let hint_line = output.lines().last().unwrap();
        assert_eq!(hint_line, "          ^^^");
    }
}
