//! Lexer for Mica source code.
//!
//! A hand-built state machine over the UTF-8 codec. Whitespace and block
//! comments are skipped between tokens; block comments do not nest, the
//! first `*/` closes at any depth. Each emitted token carries its start
//! line/column and its span length for diagnostic highlighting.
//!
//! The lexer recovers from lexical errors according to the configured
//! policy and retries token recognition, bounded by [`RETRY_LIMIT`] so
//! pathological input cannot loop forever.

use crate::context::Context;
use crate::error::{FatalError, LexicalCode, LexicalError, LexicalRecovery};
use crate::token::{keyword_kind, Token, TokenAttr, TokenKind};
use core_types::codec::{decode_codepoint, encode_codepoint_into};
use std::io::BufRead;

/// How many times `get_token` retries recognition after recovered
/// lexical errors before the run is declared unrecoverable.
pub const RETRY_LIMIT: usize = 5000;

const QUOTE: u32 = b'\'' as u32;
const BACKSLASH: u32 = b'\\' as u32;
const NEWLINE: u32 = b'\n' as u32;

fn is_ascii(c: u32) -> bool {
    c < 0x80
}

fn is_space_ascii(c: u32) -> bool {
    matches!(c, 0x09..=0x0D | 0x20)
}

fn is_print_ascii(c: u32) -> bool {
    (0x20..=0x7E).contains(&c)
}

fn is_digit_ascii(c: u32) -> bool {
    (u32::from(b'0')..=u32::from(b'9')).contains(&c)
}

fn is_alpha_unicode(c: u32) -> bool {
    char::from_u32(c).is_some_and(char::is_alphabetic)
}

fn is_alnum_unicode(c: u32) -> bool {
    char::from_u32(c).is_some_and(char::is_alphanumeric)
}

/// The character an escape sequence `\c` denotes, if `c` is in the
/// accepted escape set.
fn escaped_to_char(c: u32) -> Option<char> {
    match u8::try_from(c).ok()? {
        b'\\' => Some('\\'),
        b'\'' => Some('\''),
        b'0' => Some('\0'),
        b'n' => Some('\n'),
        b'a' => Some('\u{07}'),
        b't' => Some('\t'),
        b'v' => Some('\u{0B}'),
        b'f' => Some('\u{0C}'),
        b'r' => Some('\r'),
        _ => None,
    }
}

/// Produces positioned tokens from a UTF-8 byte stream on demand.
pub struct Lexer<R: BufRead> {
    input: R,
    /// One codepoint of lookahead; `None` once the input is exhausted.
    last: Option<u32>,
    line: u32,
    column: u32,
    token_column: u32,
    current_line: String,
    at_line_start: bool,
}

impl<R: BufRead> Lexer<R> {
    /// Create a lexer over the given byte stream.
    pub fn new(input: R) -> Self {
        Self {
            input,
            // A synthetic space; the delimiter skip consumes it and pulls
            // the first real codepoint.
            last: Some(u32::from(b' ')),
            line: 0,
            column: 0,
            token_column: 0,
            current_line: String::new(),
            at_line_start: true,
        }
    }

    /// The text of the line currently being scanned, for caret hints.
    pub fn current_line(&self) -> &str {
        &self.current_line
    }

    fn read(&mut self) {
        if self.at_line_start {
            self.column = 0;
            self.line += 1;
            self.current_line.clear();
            self.at_line_start = false;
        }

        self.last = decode_codepoint(&mut self.input);
        self.column += 1;

        match self.last {
            Some(NEWLINE) => self.at_line_start = true,
            Some(c) => encode_codepoint_into(c, &mut self.current_line),
            None => {}
        }
    }

    /// Skip one character (lexical recovery primitive).
    pub fn skip_char(&mut self) {
        self.read();
    }

    /// Skip to the end of the current line (lexical recovery primitive).
    /// The newline itself stays in the lookahead.
    pub fn skip_line(&mut self) {
        while self.last.is_some() && self.last != Some(NEWLINE) {
            self.read();
        }
    }

    fn error(&self, code: LexicalCode) -> LexicalError {
        LexicalError {
            code,
            line: self.line,
            column: self.column,
            character: self.last,
        }
    }

    fn token(&self, kind: TokenKind, attr: TokenAttr) -> Token {
        debug_assert!(self.column > self.token_column);
        Token {
            kind,
            line: self.line,
            column: self.token_column,
            length: self.column - self.token_column,
            attr,
        }
    }

    /// Skip whitespace and `/* ... */` block comments.
    fn skip_delimiters_and_comments(&mut self) -> Result<(), LexicalError> {
        loop {
            match self.last {
                Some(c) if is_space_ascii(c) => self.read(),
                Some(c) if c == u32::from(b'/') => {
                    self.read();
                    if self.last != Some(u32::from(b'*')) {
                        return Err(self.error(LexicalCode::MissingCommentStart));
                    }
                    self.read();

                    let mut closing = false;
                    loop {
                        match self.last {
                            None => return Err(self.error(LexicalCode::MissingCommentEnd)),
                            Some(c) if c == u32::from(b'*') => {
                                closing = true;
                                self.read();
                            }
                            Some(c) if c == u32::from(b'/') && closing => {
                                self.read();
                                break;
                            }
                            Some(_) => {
                                closing = false;
                                self.read();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_identifier(&mut self, first: u32, ctx: &mut Context) -> Token {
        let mut lexeme = String::new();
        encode_codepoint_into(first, &mut lexeme);
        self.read();

        loop {
            match self.last {
                Some(c) if is_alnum_unicode(c) || c == u32::from(b'_') => {
                    encode_codepoint_into(c, &mut lexeme);
                    self.read();
                }
                _ => break,
            }
        }

        if let Some(kind) = keyword_kind(&lexeme) {
            return self.token(kind, TokenAttr::Empty);
        }

        let sym = ctx.resolve_identifier(&lexeme);
        self.token(TokenKind::Identifier, TokenAttr::Symbol(sym))
    }

    fn scan_number(&mut self, first: u32) -> Result<Token, LexicalError> {
        let mut value = (first - u32::from(b'0')) as i32;
        let mut too_big = false;
        self.read();

        while let Some(c) = self.last.filter(|&c| is_digit_ascii(c)) {
            if !too_big {
                value = value * 10 + (c - u32::from(b'0')) as i32;
                if value > 32767 {
                    too_big = true;
                }
            }
            self.read();
        }

        // The whole literal is consumed before the overflow is reported.
        if too_big {
            return Err(self.error(LexicalCode::IntTooBig));
        }

        Ok(self.token(TokenKind::Cint, TokenAttr::Int(value as i16)))
    }

    fn scan_string(&mut self) -> Result<Token, LexicalError> {
        let mut text = String::new();
        let mut count = 0usize;
        self.read();

        loop {
            match self.last {
                None => return Err(self.error(LexicalCode::MissingStringEnd)),
                Some(QUOTE) => break,
                Some(BACKSLASH) => {
                    self.read();
                    match self.last.and_then(escaped_to_char) {
                        Some(c) => {
                            text.push(c);
                            count += 1;
                            self.read();
                        }
                        None => return Err(self.error(LexicalCode::StringEscapeSequence)),
                    }
                }
                Some(c) if !is_ascii(c) || is_print_ascii(c) => {
                    encode_codepoint_into(c, &mut text);
                    count += 1;
                    self.read();
                }
                Some(_) => return Err(self.error(LexicalCode::StringForbiddenCharacter)),
            }
        }

        // Checked before the closing quote is consumed, so skip-char
        // recovery lands on the quote and the next scan starts clean.
        if count > 64 {
            return Err(self.error(LexicalCode::StringTooLong));
        }

        self.read();
        Ok(self.token(TokenKind::Cstr, TokenAttr::Str(text)))
    }

    fn read_token(&mut self, ctx: &mut Context) -> Result<Token, LexicalError> {
        self.skip_delimiters_and_comments()?;
        self.token_column = self.column;

        let current = match self.last {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::End,
                    line: self.line,
                    column: self.column,
                    length: 0,
                    attr: TokenAttr::Empty,
                })
            }
        };

        if is_alpha_unicode(current) {
            return Ok(self.scan_identifier(current, ctx));
        }

        if is_digit_ascii(current) {
            return self.scan_number(current);
        }

        if current == QUOTE {
            return self.scan_string();
        }

        match u8::try_from(current) {
            Ok(b'+') => {
                self.read();
                if self.last == Some(u32::from(b'=')) {
                    self.read();
                    Ok(self.token(TokenKind::CumulativeAssign, TokenAttr::Empty))
                } else {
                    Ok(self.token(TokenKind::Sum, TokenAttr::Empty))
                }
            }
            Ok(b'-') => {
                self.read();
                Ok(self.token(TokenKind::Sub, TokenAttr::Empty))
            }
            Ok(b'=') => {
                self.read();
                Ok(self.token(TokenKind::Assign, TokenAttr::Empty))
            }
            Ok(b'<') => {
                self.read();
                Ok(self.token(TokenKind::Less, TokenAttr::Empty))
            }
            Ok(b'>') => {
                self.read();
                Ok(self.token(TokenKind::Greater, TokenAttr::Empty))
            }
            Ok(b'&') => {
                self.read();
                if self.last != Some(u32::from(b'&')) {
                    return Err(self.error(LexicalCode::MissingOpAnd));
                }
                self.read();
                Ok(self.token(TokenKind::And, TokenAttr::Empty))
            }
            Ok(b'|') => {
                self.read();
                if self.last != Some(u32::from(b'|')) {
                    return Err(self.error(LexicalCode::MissingOpOr));
                }
                self.read();
                Ok(self.token(TokenKind::Or, TokenAttr::Empty))
            }
            Ok(b',') => {
                self.read();
                Ok(self.token(TokenKind::Comma, TokenAttr::Empty))
            }
            Ok(b';') => {
                self.read();
                Ok(self.token(TokenKind::Semicolon, TokenAttr::Empty))
            }
            Ok(b'(') => {
                self.read();
                Ok(self.token(TokenKind::ParenOpen, TokenAttr::Empty))
            }
            Ok(b')') => {
                self.read();
                Ok(self.token(TokenKind::ParenClose, TokenAttr::Empty))
            }
            Ok(b'{') => {
                self.read();
                Ok(self.token(TokenKind::BraceOpen, TokenAttr::Empty))
            }
            Ok(b'}') => {
                self.read();
                Ok(self.token(TokenKind::BraceClose, TokenAttr::Empty))
            }
            _ => Err(self.error(LexicalCode::UnexpectedStartCharacter)),
        }
    }

    /// Scan the next token, recovering from lexical errors according to
    /// the run's policy.
    ///
    /// Retries are bounded by [`RETRY_LIMIT`]; exceeding the bound, or a
    /// `Critical` recovery policy, yields [`FatalError`].
    pub fn get_token(&mut self, ctx: &mut Context) -> Result<Token, FatalError> {
        for _ in 0..RETRY_LIMIT {
            match self.read_token(ctx) {
                Ok(token) => return Ok(token),
                Err(error) => {
                    let line = self.current_line.clone();
                    match ctx.errors.report_lexical(&error, &line)? {
                        LexicalRecovery::SkipChar => self.skip_char(),
                        LexicalRecovery::SkipLine => self.skip_line(),
                    }
                }
            }
        }

        Err(ctx.errors.fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TraceMode;
    use crate::error::LexicalRecoveryMode;
    use core_types::RunStatus;
    use std::io;

    fn quiet_context(semantic: bool) -> Context {
        let mut ctx = Context::new(semantic, TraceMode::None);
        ctx.errors = crate::error::ErrorManager::with_sink(Box::new(io::sink()));
        ctx
    }

    fn kinds_of(source: &str) -> Vec<TokenKind> {
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new(source.as_bytes());
        let mut kinds = Vec::new();
        loop {
            let token = lexer.get_token(&mut ctx).expect("lexing failed");
            let kind = token.kind;
            kinds.push(kind);
            if kind == TokenKind::End {
                return kinds;
            }
        }
    }

    #[test]
    fn test_keywords_and_identifiers() {
        use TokenKind::*;
        assert_eq!(
            kinds_of("var int contador;"),
            vec![Var, Int, Identifier, Semicolon, End]
        );
    }

    #[test]
    fn test_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds_of("+ += - = < > && || , ; ( ) { }"),
            vec![
                Sum,
                CumulativeAssign,
                Sub,
                Assign,
                Less,
                Greater,
                And,
                Or,
                Comma,
                Semicolon,
                ParenOpen,
                ParenClose,
                BraceOpen,
                BraceClose,
                End
            ]
        );
    }

    #[test]
    fn test_positions_and_lengths() {
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new("if\n  cadena".as_bytes());

        let first = lexer.get_token(&mut ctx).unwrap();
        assert_eq!((first.line, first.column, first.length), (1, 1, 2));

        let second = lexer.get_token(&mut ctx).unwrap();
        assert_eq!((second.line, second.column, second.length), (2, 3, 6));
    }

    #[test]
    fn test_integer_boundary() {
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new("32767".as_bytes());
        let token = lexer.get_token(&mut ctx).unwrap();
        assert_eq!(token.attr, TokenAttr::Int(32767));
        assert_eq!(ctx.errors.status(), RunStatus::Clean);
    }

    #[test]
    fn test_integer_overflow_reported_and_recovered() {
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new("32768 7".as_bytes());

        // The oversized literal is dropped; skip-char recovery costs the
        // following space and scanning resumes at the next literal.
        let token = lexer.get_token(&mut ctx).unwrap();
        assert_eq!(token.attr, TokenAttr::Int(7));
        assert_eq!(ctx.errors.status(), RunStatus::Recovered);
    }

    #[test]
    fn test_string_literal_with_escapes() {
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new(r"'abc\n\'d'".as_bytes());
        let token = lexer.get_token(&mut ctx).unwrap();
        assert_eq!(token.kind, TokenKind::Cstr);
        assert_eq!(token.attr, TokenAttr::Str("abc\n'd".to_string()));
    }

    #[test]
    fn test_string_boundary() {
        let exactly_64 = format!("'{}'", "a".repeat(64));
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new(exactly_64.as_bytes());
        assert_eq!(lexer.get_token(&mut ctx).unwrap().kind, TokenKind::Cstr);
        assert_eq!(ctx.errors.status(), RunStatus::Clean);

        let over = format!("'{}'", "a".repeat(65));
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new(over.as_bytes());
        let token = lexer.get_token(&mut ctx).unwrap();
        // The literal is dropped; skip-char recovery consumes the pending
        // closing quote and the next scan sees the end of input.
        assert_eq!(token.kind, TokenKind::End);
        assert_eq!(ctx.errors.status(), RunStatus::Recovered);
    }

    #[test]
    fn test_invalid_escape_sequence() {
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new(r"'a\qb' ;".as_bytes());
        // Recovery eventually resynchronizes; the run is flagged.
        loop {
            let token = lexer.get_token(&mut ctx).unwrap();
            if token.kind == TokenKind::End {
                break;
            }
        }
        assert_eq!(ctx.errors.status(), RunStatus::Recovered);
    }

    #[test]
    fn test_comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(
            kinds_of("a /* comment /* no nesting */ b"),
            vec![Identifier, Identifier, End]
        );
    }

    #[test]
    fn test_unterminated_comment_skip_line_terminates() {
        let mut ctx = quiet_context(false);
        ctx.errors
            .set_lexical_recovery_mode(LexicalRecoveryMode::SkipLine);
        let mut lexer = Lexer::new("/* never closed".as_bytes());

        let token = lexer.get_token(&mut ctx).unwrap();
        assert_eq!(token.kind, TokenKind::End);
        assert_eq!(ctx.errors.status(), RunStatus::Recovered);
    }

    #[test]
    fn test_lone_ampersand() {
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new("a & b".as_bytes());
        let mut kinds = Vec::new();
        loop {
            let token = lexer.get_token(&mut ctx).unwrap();
            kinds.push(token.kind);
            if token.kind == TokenKind::End {
                break;
            }
        }
        assert_eq!(ctx.errors.status(), RunStatus::Recovered);
        assert_eq!(
            kinds,
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::End]
        );
    }

    #[test]
    fn test_critical_mode_aborts() {
        let mut ctx = quiet_context(false);
        ctx.errors
            .set_lexical_recovery_mode(LexicalRecoveryMode::Critical);
        let mut lexer = Lexer::new("#".as_bytes());

        assert_eq!(lexer.get_token(&mut ctx), Err(FatalError));
        assert_eq!(ctx.errors.status(), RunStatus::Unrecoverable);
    }

    #[test]
    fn test_identifiers_share_symbol_entries() {
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new("uno dos uno".as_bytes());

        let first = lexer.get_token(&mut ctx).unwrap();
        let second = lexer.get_token(&mut ctx).unwrap();
        let third = lexer.get_token(&mut ctx).unwrap();

        assert_eq!(first.symbol_ref().index, 0);
        assert_eq!(second.symbol_ref().index, 1);
        assert_eq!(third.symbol_ref().index, 0);
    }

    #[test]
    fn test_unicode_identifier() {
        let mut ctx = quiet_context(false);
        let mut lexer = Lexer::new("año = 1;".as_bytes());
        let token = lexer.get_token(&mut ctx).unwrap();
        assert_eq!(token.kind, TokenKind::Identifier);
        assert_eq!(ctx.scopes.global().symbol_name(0), "año");
        // Length counts characters, not bytes.
        assert_eq!(token.length, 3);
    }
}
