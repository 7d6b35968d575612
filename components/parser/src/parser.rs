//! Recursive descent parser for Mica with synthesized type attributes.
//!
//! One method per grammar non-terminal. Each method inspects the current
//! token against the rule's FIRST set and either recurses into sub-rules
//! or raises a syntax error naming the expected construct. In a semantic
//! run every expression production additionally synthesizes a type; a
//! violated type rule logs a diagnostic, poisons the synthesized type to
//! the absorbing error marker and parsing continues.
//!
//! Syntax errors unwind to [`Parser::parse`] through the `Result` chain
//! and stop the run; lexical and semantic errors never unwind past the
//! call that raised them.
//!
//! Recursion depth follows the input's nesting (parenthesized
//! expressions, operator chains, statement sequences), which is bounded
//! by the native call stack; realistic Mica programs stay far below it.

use crate::context::{Context, TraceMode};
use crate::error::{FatalError, ParseAbort, SemanticCode, SyntaxCode, SyntaxError};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use crate::types::TypeValue;
use core_types::{SourcePosition, SourceSpan};
use std::io::BufRead;

/// Synthesized attributes of the start symbol.
struct ProgramAttr {
    ok: bool,
}

/// Synthesized attributes of a function declaration.
struct FunctionAttr {
    ok: bool,
}

/// Synthesized attributes of a type production.
struct TypeAttr {
    ty: TypeValue,
    span: SourceSpan,
}

/// Synthesized attributes of a declared parameter list. `types` holds
/// the `[void]` placeholder for an empty list.
struct ParamsAttr {
    ok: bool,
    types: Vec<TypeValue>,
}

/// Synthesized attributes of a statement sequence: success plus the
/// merged return-type contribution.
struct BodyAttr {
    ok: bool,
    ret: TypeValue,
}

/// Synthesized attributes of a single statement.
struct StmtAttr {
    ok: bool,
    ret: TypeValue,
}

/// Synthesized attributes of an expression or expression tail. A tail
/// that derived the empty production carries `Void`.
struct ExprAttr {
    ty: TypeValue,
    span: SourceSpan,
}

/// Synthesized attributes of a call argument list. `None` when a poisoned
/// argument makes the list unusable; an empty call carries `[void]`.
struct ArgsAttr {
    types: Option<Vec<TypeValue>>,
}

/// What followed an identifier.
enum IdSuffix {
    /// An assignment; the payload is the right-hand side's type, already
    /// checked against the compound-assignment rule.
    Assign(TypeValue),
    /// A call with the given argument types.
    Call(Option<Vec<TypeValue>>),
    /// Nothing: a plain variable use.
    Plain,
}

/// Synthesized attributes of the constructs following an identifier.
struct IdSuffixAttr {
    suffix: IdSuffix,
    span: SourceSpan,
}

/// Synthesized attributes of a `for` action clause.
struct ForActAttr {
    ok: bool,
}

/// Synthesized attributes of an assignment operator.
struct AssignAttr {
    cumulative: bool,
}

/// Synthesized attributes of an additive operator.
struct AddOpAttr {
    is_sum: bool,
}

/// Synthesized attributes of a return expression.
struct RetExpAttr {
    ty: TypeValue,
}

/// Recursive descent parser over a pull-model token stream.
///
/// Owns the lexer and a single lookahead token. Trace output (production
/// numbers, scope-close table dumps) accumulates in an internal buffer
/// the driver collects after the run.
pub struct Parser<R: BufRead> {
    lexer: Lexer<R>,
    current: Token,
    /// End position of the last consumed token, for span bookkeeping.
    last_end: SourcePosition,
    output: String,
}

impl<R: BufRead> Parser<R> {
    /// Create a parser over the given byte stream.
    pub fn new(input: R) -> Self {
        Self {
            lexer: Lexer::new(input),
            current: Token::default(),
            last_end: SourcePosition { line: 0, column: 0 },
            output: String::new(),
        }
    }

    /// The accumulated trace output.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Recognize one program, reporting diagnostics through the context.
    ///
    /// Returns `Err` when the run aborted: on the first syntax error
    /// (reported here) or on an unrecoverable lexical condition (already
    /// reported). The aggregate outcome is in `ctx.errors.status()`.
    pub fn parse(&mut self, ctx: &mut Context) -> Result<(), FatalError> {
        ctx.scopes.implicit_declaration = true;

        let result = self.advance(ctx).and_then(|()| self.program(ctx));
        match result {
            Ok(program) => {
                if ctx.semantic && !program.ok {
                    ctx.errors
                        .report_note("There are semantic errors in the program.");
                }
                Ok(())
            }
            Err(ParseAbort::Syntax(error)) => {
                // Complete the current line so the hint shows all of it.
                self.lexer.skip_line();
                let line = self.lexer.current_line().to_string();
                ctx.errors.report_syntax(&error, &line);
                Err(FatalError)
            }
            Err(ParseAbort::Fatal(fatal)) => Err(fatal),
        }
    }

    fn advance(&mut self, ctx: &mut Context) -> Result<(), ParseAbort> {
        self.last_end = SourcePosition {
            line: self.current.line,
            column: self.current.column + self.current.length,
        };
        self.current = self.lexer.get_token(ctx)?;
        Ok(())
    }

    fn expect(&self, kind: TokenKind, code: SyntaxCode) -> Result<(), ParseAbort> {
        if self.current.kind == kind {
            Ok(())
        } else {
            Err(ParseAbort::Syntax(SyntaxError::new(
                code,
                self.current.clone(),
            )))
        }
    }

    fn syntax_error<T>(&self, code: SyntaxCode) -> Result<T, ParseAbort> {
        Err(ParseAbort::Syntax(SyntaxError::new(
            code,
            self.current.clone(),
        )))
    }

    fn open_span(&self) -> SourceSpan {
        self.current.span()
    }

    /// The span a rule covered: from its first token through the last
    /// token consumed while it was open.
    fn close_span(&self, opened: SourceSpan) -> SourceSpan {
        if self.last_end.is_after(opened.start) {
            SourceSpan {
                start: opened.start,
                end: self.last_end,
            }
        } else {
            opened
        }
    }

    fn production(&mut self, ctx: &Context, number: u32) {
        if ctx.trace == TraceMode::Productions {
            self.output.push(' ');
            self.output.push_str(&number.to_string());
        }
    }

    /// Emit the closing scope's table dump, per the trace mode.
    fn dump_closing_table(&mut self, ctx: &Context) {
        match ctx.trace {
            TraceMode::Productions => {
                self.output.push('\n');
                ctx.scopes.write_current_table(&mut self.output);
            }
            TraceMode::Tables => {
                ctx.scopes.write_current_table(&mut self.output);
                self.output.push('\n');
            }
            TraceMode::None => {}
        }
    }

    /// Log a semantic diagnostic over `span`. The caret length collapses
    /// to zero when the construct started on an earlier line.
    fn log_semantic(&self, ctx: &mut Context, span: SourceSpan, code: SemanticCode, message: &str) {
        let length = if self.current.line == span.start.line {
            span.end.column.saturating_sub(span.start.column)
        } else {
            0
        };
        ctx.errors.report_semantic(
            code,
            span.start,
            length,
            message,
            self.lexer.current_line(),
        );
    }

    // P -> FUNCTION P | STATEMENT P | eof
    fn program(&mut self, ctx: &mut Context) -> Result<ProgramAttr, ParseAbort> {
        match self.current.kind {
            TokenKind::Function => {
                self.production(ctx, 1);

                let function = self.function(ctx)?;
                let rest = self.program(ctx)?;

                Ok(ProgramAttr {
                    ok: function.ok && rest.ok,
                })
            }

            TokenKind::If
            | TokenKind::For
            | TokenKind::Var
            | TokenKind::Identifier
            | TokenKind::Output
            | TokenKind::Input
            | TokenKind::Return => {
                self.production(ctx, 2);

                let statement = self.statement(ctx)?;
                let rest = self.program(ctx)?;

                Ok(ProgramAttr {
                    ok: statement.ok && rest.ok,
                })
            }

            TokenKind::End => {
                self.production(ctx, 3);
                Ok(ProgramAttr { ok: true })
            }

            _ => self.syntax_error(SyntaxCode::TopLevelInvalid),
        }
    }

    // FUNCTION -> function FUNTYPE id ( FUNATTRS ) { BODY }
    fn function(&mut self, ctx: &mut Context) -> Result<FunctionAttr, ParseAbort> {
        debug_assert_eq!(self.current.kind, TokenKind::Function);
        self.production(ctx, 4);

        if ctx.semantic {
            ctx.scopes.implicit_declaration = false;
        }
        self.advance(ctx)?;

        let fun_type = self.fun_type(ctx)?;

        self.expect(TokenKind::Identifier, SyntaxCode::FunctionMissingIdentifier)?;
        let id = self.current.clone();
        if ctx.semantic {
            ctx.scopes.enter_function_scope();
        }
        self.advance(ctx)?;

        self.expect(TokenKind::ParenOpen, SyntaxCode::FunctionMissingParenOpen)?;
        self.advance(ctx)?;

        let params = self.fun_attrs(ctx)?;

        let mut ok = true;
        if ctx.semantic {
            let sym = id.symbol_ref();
            if ctx.scopes.has_type(sym) {
                ok = false;
                self.log_semantic(
                    ctx,
                    id.span(),
                    SemanticCode::IdentifierAlreadyExists,
                    "The function name is already in use.",
                );
            } else {
                ok = params.ok;
                ctx.scopes.add_function_type(sym, &fun_type.ty, &params.types);
                ctx.scopes.add_function_tag(sym);
            }

            ctx.scopes.implicit_declaration = true;
        }

        self.expect(TokenKind::ParenClose, SyntaxCode::FunctionMissingParenClose)?;
        self.advance(ctx)?;

        self.expect(TokenKind::BraceOpen, SyntaxCode::FunctionMissingBraceOpen)?;
        self.advance(ctx)?;

        let body = self.body(ctx)?;

        self.expect(TokenKind::BraceClose, SyntaxCode::FunctionMissingBraceClose)?;
        if ctx.semantic {
            if fun_type.ty != body.ret {
                ok = false;
                let sym = id.symbol_ref();
                let message = format!(
                    "The return type of function '{}' ('{}') does not match the returned \
                     type ('{}').",
                    ctx.scopes.symbol_name(sym),
                    fun_type.ty,
                    body.ret
                );
                self.log_semantic(ctx, fun_type.span, SemanticCode::InvalidReturnType, &message);
            }

            self.dump_closing_table(ctx);
            ctx.scopes.close_local();
        }
        self.advance(ctx)?;

        Ok(FunctionAttr { ok })
    }

    // FUNTYPE -> void | VARTYPE
    fn fun_type(&mut self, ctx: &mut Context) -> Result<TypeAttr, ParseAbort> {
        match self.current.kind {
            TokenKind::Void => {
                self.production(ctx, 5);
                let span = self.current.span();
                self.advance(ctx)?;
                Ok(TypeAttr {
                    ty: TypeValue::Void,
                    span,
                })
            }

            TokenKind::Int | TokenKind::Boolean | TokenKind::Str => {
                self.production(ctx, 6);
                self.var_type(ctx)
            }

            _ => self.syntax_error(SyntaxCode::FunTypeInvalid),
        }
    }

    // VARTYPE -> int | boolean | string
    fn var_type(&mut self, ctx: &mut Context) -> Result<TypeAttr, ParseAbort> {
        let ty = match self.current.kind {
            TokenKind::Int => {
                self.production(ctx, 7);
                TypeValue::Int
            }
            TokenKind::Boolean => {
                self.production(ctx, 8);
                TypeValue::Bool
            }
            TokenKind::Str => {
                self.production(ctx, 9);
                TypeValue::Str
            }
            TokenKind::Void => return self.syntax_error(SyntaxCode::VarTypeVoid),
            _ => return self.syntax_error(SyntaxCode::VarTypeInvalid),
        };

        let span = self.current.span();
        self.advance(ctx)?;
        Ok(TypeAttr { ty, span })
    }

    // FUNATTRS -> void | VARTYPE id NEXTATTRS
    fn fun_attrs(&mut self, ctx: &mut Context) -> Result<ParamsAttr, ParseAbort> {
        match self.current.kind {
            TokenKind::Void => {
                self.production(ctx, 10);
                self.advance(ctx)?;
                Ok(ParamsAttr {
                    ok: true,
                    types: vec![TypeValue::Void],
                })
            }

            TokenKind::Int | TokenKind::Boolean | TokenKind::Str => {
                self.production(ctx, 11);

                let var_type = self.var_type(ctx)?;
                let mut ok = self.declare_parameter(ctx, &var_type)?;
                let rest = self.next_attrs(ctx)?;

                ok = ok && rest.ok;
                let mut types = vec![var_type.ty];
                if rest.types != [TypeValue::Void] {
                    types.extend(rest.types);
                }
                Ok(ParamsAttr { ok, types })
            }

            TokenKind::ParenClose => self.syntax_error(SyntaxCode::FunParamsEmpty),
            _ => self.syntax_error(SyntaxCode::FunParamsInvalid),
        }
    }

    // NEXTATTRS -> , VARTYPE id NEXTATTRS | lambda
    fn next_attrs(&mut self, ctx: &mut Context) -> Result<ParamsAttr, ParseAbort> {
        match self.current.kind {
            TokenKind::Comma => {
                self.production(ctx, 12);
                self.advance(ctx)?;

                let var_type = self.var_type(ctx)?;
                let mut ok = self.declare_parameter(ctx, &var_type)?;
                let rest = self.next_attrs(ctx)?;

                ok = ok && rest.ok;
                let mut types = vec![var_type.ty];
                if rest.types != [TypeValue::Void] {
                    types.extend(rest.types);
                }
                Ok(ParamsAttr { ok, types })
            }

            _ => {
                self.production(ctx, 13);
                Ok(ParamsAttr {
                    ok: true,
                    types: vec![TypeValue::Void],
                })
            }
        }
    }

    /// Shared tail of the two parameter productions: match the parameter
    /// name, record its type and offset, flag a duplicate.
    fn declare_parameter(
        &mut self,
        ctx: &mut Context,
        var_type: &TypeAttr,
    ) -> Result<bool, ParseAbort> {
        self.expect(TokenKind::Identifier, SyntaxCode::FunParamsMissingIdentifier)?;
        let id = self.current.clone();

        let mut ok = true;
        if ctx.semantic {
            let sym = id.symbol_ref();
            if ctx.scopes.has_type(sym) {
                ok = false;
                self.log_semantic(
                    ctx,
                    id.span(),
                    SemanticCode::IdentifierAlreadyExists,
                    "The parameter name is already in use.",
                );
            } else {
                ctx.scopes.add_type(sym, &var_type.ty);
                let offset = ctx.scopes.alloc_local(var_type.ty.width());
                ctx.scopes.add_offset(sym, offset);
            }
        }

        self.advance(ctx)?;
        Ok(ok)
    }

    // BODY -> STATEMENT BODY | lambda
    fn body(&mut self, ctx: &mut Context) -> Result<BodyAttr, ParseAbort> {
        match self.current.kind {
            TokenKind::If
            | TokenKind::For
            | TokenKind::Var
            | TokenKind::Identifier
            | TokenKind::Output
            | TokenKind::Input
            | TokenKind::Return => {
                self.production(ctx, 14);

                let statement = self.statement(ctx)?;
                let rest = self.body(ctx)?;

                if !ctx.semantic {
                    return Ok(BodyAttr {
                        ok: true,
                        ret: TypeValue::Void,
                    });
                }

                // Merge return-type contributions: void is neutral,
                // conflicting non-void contributions poison.
                let ret = if statement.ret == rest.ret || statement.ret == TypeValue::Void {
                    rest.ret
                } else if rest.ret == TypeValue::Void {
                    statement.ret
                } else {
                    TypeValue::Error
                };

                Ok(BodyAttr {
                    ok: statement.ok && rest.ok,
                    ret,
                })
            }

            _ => {
                self.production(ctx, 15);
                Ok(BodyAttr {
                    ok: true,
                    ret: TypeValue::Void,
                })
            }
        }
    }

    // STATEMENT -> if ( EXP ) ATOMSTMT | for ( FORACT ; EXP ; FORACT ) { BODY }
    //            | var VARTYPE id ; | ATOMSTMT
    fn statement(&mut self, ctx: &mut Context) -> Result<StmtAttr, ParseAbort> {
        match self.current.kind {
            TokenKind::If => {
                self.production(ctx, 16);
                self.advance(ctx)?;

                self.expect(TokenKind::ParenOpen, SyntaxCode::IfMissingParenOpen)?;
                self.advance(ctx)?;

                let cond = self.expr(ctx)?;
                let mut ok = true;
                if ctx.semantic {
                    if cond.ty.is_error() {
                        ok = false;
                    } else if cond.ty != TypeValue::Bool {
                        ok = false;
                        let message = format!(
                            "The 'if' argument must be of type 'boolean'. The evaluated type \
                             is '{}'.",
                            cond.ty
                        );
                        self.log_semantic(
                            ctx,
                            cond.span,
                            SemanticCode::InvalidIfConditionType,
                            &message,
                        );
                    }
                }

                self.expect(TokenKind::ParenClose, SyntaxCode::IfMissingParenClose)?;
                self.advance(ctx)?;

                let then = self.atom_stmt(ctx)?;
                Ok(StmtAttr {
                    ok: ok && then.ok,
                    ret: then.ret,
                })
            }

            TokenKind::For => {
                self.production(ctx, 17);
                self.advance(ctx)?;

                self.expect(TokenKind::ParenOpen, SyntaxCode::ForMissingParenOpen)?;
                self.advance(ctx)?;

                let init = self.for_act(ctx)?;
                let mut ok = init.ok;

                self.expect(TokenKind::Semicolon, SyntaxCode::ForMissingSemicolon)?;
                self.advance(ctx)?;

                let cond = self.expr(ctx)?;
                if ctx.semantic {
                    if cond.ty.is_error() {
                        ok = false;
                    } else if cond.ty != TypeValue::Bool {
                        ok = false;
                        let message = format!(
                            "The second 'for' argument must be of type 'boolean'. The \
                             evaluated type is '{}'.",
                            cond.ty
                        );
                        self.log_semantic(
                            ctx,
                            cond.span,
                            SemanticCode::InvalidForConditionType,
                            &message,
                        );
                    }
                }

                self.expect(TokenKind::Semicolon, SyntaxCode::ForMissingSemicolon)?;
                self.advance(ctx)?;

                let step = self.for_act(ctx)?;
                ok = ok && step.ok;

                self.expect(TokenKind::ParenClose, SyntaxCode::ForMissingParenClose)?;
                self.advance(ctx)?;

                self.expect(TokenKind::BraceOpen, SyntaxCode::ForMissingBraceOpen)?;
                self.advance(ctx)?;

                let body = self.body(ctx)?;

                self.expect(TokenKind::BraceClose, SyntaxCode::ForMissingBraceClose)?;
                self.advance(ctx)?;

                Ok(StmtAttr {
                    ok: ok && body.ok,
                    ret: body.ret,
                })
            }

            TokenKind::Var => {
                self.production(ctx, 18);
                self.advance(ctx)?;

                if ctx.semantic {
                    ctx.scopes.implicit_declaration = false;
                }

                let var_type = self.var_type(ctx)?;

                self.expect(TokenKind::Identifier, SyntaxCode::VarMissingIdentifier)?;
                let id = self.current.clone();

                let mut ok = true;
                if ctx.semantic {
                    let sym = id.symbol_ref();
                    if ctx.scopes.has_type(sym) {
                        ok = false;
                        self.log_semantic(
                            ctx,
                            id.span(),
                            SemanticCode::IdentifierAlreadyExists,
                            "The name of the variable being declared is already in use.",
                        );
                    } else {
                        ctx.scopes.add_type(sym, &var_type.ty);
                        let offset = ctx.scopes.alloc_current(var_type.ty.width());
                        ctx.scopes.add_offset(sym, offset);
                    }

                    ctx.scopes.implicit_declaration = true;
                }
                self.advance(ctx)?;

                self.expect(TokenKind::Semicolon, SyntaxCode::StatementMissingSemicolon)?;
                self.advance(ctx)?;

                Ok(StmtAttr {
                    ok,
                    ret: TypeValue::Void,
                })
            }

            TokenKind::Identifier | TokenKind::Output | TokenKind::Input | TokenKind::Return => {
                self.production(ctx, 19);
                self.atom_stmt(ctx)
            }

            _ => self.syntax_error(SyntaxCode::StatementInvalid),
        }
    }

    // ATOMSTMT -> id IDACT ; | output EXP ; | input id ; | return RETEXP ;
    fn atom_stmt(&mut self, ctx: &mut Context) -> Result<StmtAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::Identifier => {
                self.production(ctx, 20);
                let id = self.current.clone();
                self.advance(ctx)?;

                let act = self.id_act(ctx)?;

                let mut ok = true;
                if ctx.semantic {
                    let sym = id.symbol_ref();
                    let declared = ctx.scopes.get_type(sym);

                    match act.suffix {
                        IdSuffix::Call(args) => {
                            if !declared.is_function() {
                                ok = false;
                                let span = self.close_span(opened);
                                self.log_semantic(
                                    ctx,
                                    span,
                                    SemanticCode::VariableCalledAsFunction,
                                    "A variable cannot be called as if it were a function.",
                                );
                            } else {
                                match args {
                                    None => ok = false,
                                    Some(given) => {
                                        if given != declared.arg_types() {
                                            ok = false;
                                            let message = format!(
                                                "The call argument types do not match the \
                                                 function definition. Expected {}, got {}.",
                                                TypeValue::render_list(&declared.arg_types()),
                                                TypeValue::render_list(&given)
                                            );
                                            self.log_semantic(
                                                ctx,
                                                act.span,
                                                SemanticCode::IncoherentCallParamTypes,
                                                &message,
                                            );
                                        }
                                    }
                                }
                            }
                        }

                        IdSuffix::Assign(rhs) => {
                            if declared.is_function() {
                                ok = false;
                                self.log_semantic(
                                    ctx,
                                    act.span,
                                    SemanticCode::FunctionUsedAsVariable,
                                    "Cannot assign values to a function.",
                                );
                            } else if rhs.is_error() {
                                ok = false;
                            } else if rhs != declared {
                                ok = false;
                                let message = format!(
                                    "The types on both sides of the assignment do not match. \
                                     The variable is of type '{declared}', but the expression \
                                     is '{rhs}'."
                                );
                                self.log_semantic(
                                    ctx,
                                    act.span,
                                    SemanticCode::IncoherentTypes,
                                    &message,
                                );
                            }
                        }

                        IdSuffix::Plain => unreachable!("IDACT always assigns or calls"),
                    }
                }

                self.expect(TokenKind::Semicolon, SyntaxCode::StatementMissingSemicolon)?;
                self.advance(ctx)?;

                Ok(StmtAttr {
                    ok,
                    ret: TypeValue::Void,
                })
            }

            TokenKind::Output => {
                self.production(ctx, 21);
                self.advance(ctx)?;

                let exp = self.expr(ctx)?;
                let mut ok = true;
                if ctx.semantic {
                    if exp.ty.is_error() {
                        ok = false;
                    } else if exp.ty != TypeValue::Int && exp.ty != TypeValue::Str {
                        ok = false;
                        let message = format!(
                            "An expression of type '{}' cannot be displayed with 'output'. \
                             'output' accepts 'int' and 'string'.",
                            exp.ty
                        );
                        self.log_semantic(ctx, exp.span, SemanticCode::InvalidOutputType, &message);
                    }
                }

                self.expect(TokenKind::Semicolon, SyntaxCode::StatementMissingSemicolon)?;
                self.advance(ctx)?;

                Ok(StmtAttr {
                    ok,
                    ret: TypeValue::Void,
                })
            }

            TokenKind::Input => {
                self.production(ctx, 22);
                self.advance(ctx)?;

                self.expect(TokenKind::Identifier, SyntaxCode::InputMissingIdentifier)?;
                let id = self.current.clone();

                let mut ok = true;
                if ctx.semantic {
                    let declared = ctx.scopes.get_type(id.symbol_ref());
                    if declared != TypeValue::Int && declared != TypeValue::Str {
                        ok = false;
                        let message = format!(
                            "An object of type '{declared}' cannot be used with 'input'. \
                             'input' accepts variables of type 'int' or 'string'."
                        );
                        self.log_semantic(ctx, id.span(), SemanticCode::InvalidInputType, &message);
                    }
                }
                self.advance(ctx)?;

                self.expect(TokenKind::Semicolon, SyntaxCode::StatementMissingSemicolon)?;
                self.advance(ctx)?;

                Ok(StmtAttr {
                    ok,
                    ret: TypeValue::Void,
                })
            }

            TokenKind::Return => {
                self.production(ctx, 23);
                self.advance(ctx)?;

                let ret = self.ret_exp(ctx)?;
                let ok = !ret.ty.is_error();

                self.expect(TokenKind::Semicolon, SyntaxCode::StatementMissingSemicolon)?;
                self.advance(ctx)?;

                Ok(StmtAttr { ok, ret: ret.ty })
            }

            _ => self.syntax_error(SyntaxCode::StatementInvalid),
        }
    }

    // IDACT -> ASS EXP | ( CALLPARAMS )
    fn id_act(&mut self, ctx: &mut Context) -> Result<IdSuffixAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::Assign | TokenKind::CumulativeAssign => {
                self.production(ctx, 24);

                let assign = self.assign_op(ctx)?;
                let exp = self.expr(ctx)?;
                let span = self.close_span(opened);

                let ty = if !ctx.semantic {
                    TypeValue::Void
                } else if assign.cumulative {
                    if exp.ty.is_error() {
                        TypeValue::Error
                    } else if exp.ty == TypeValue::Int || exp.ty == TypeValue::Str {
                        exp.ty
                    } else {
                        let message = format!(
                            "Only 'int' expressions can be incremented and only 'string' \
                             expressions concatenated. The current type is '{}'.",
                            exp.ty
                        );
                        self.log_semantic(ctx, exp.span, SemanticCode::InvalidType, &message);
                        TypeValue::Error
                    }
                } else {
                    exp.ty
                };

                Ok(IdSuffixAttr {
                    suffix: IdSuffix::Assign(ty),
                    span,
                })
            }

            TokenKind::ParenOpen => {
                self.production(ctx, 25);
                self.advance(ctx)?;

                let args = self.call_params(ctx)?;

                self.expect(TokenKind::ParenClose, SyntaxCode::CallMissingParenClose)?;
                self.advance(ctx)?;

                Ok(IdSuffixAttr {
                    suffix: IdSuffix::Call(args.types),
                    span: self.close_span(opened),
                })
            }

            _ => self.syntax_error(SyntaxCode::IdActInvalid),
        }
    }

    // FORACT -> id ASS EXP | lambda
    fn for_act(&mut self, ctx: &mut Context) -> Result<ForActAttr, ParseAbort> {
        match self.current.kind {
            TokenKind::Identifier => {
                self.production(ctx, 26);
                let id = self.current.clone();
                self.advance(ctx)?;

                let _assign = self.assign_op(ctx)?;
                let exp = self.expr(ctx)?;

                let mut ok = true;
                if ctx.semantic {
                    let declared = ctx.scopes.get_type(id.symbol_ref());
                    if declared != TypeValue::Int {
                        ok = false;
                        let message = format!(
                            "The type of a 'for' variable must be 'int'. The current type \
                             is '{declared}'."
                        );
                        self.log_semantic(
                            ctx,
                            id.span(),
                            SemanticCode::InvalidForActionType,
                            &message,
                        );
                    } else if exp.ty.is_error() {
                        ok = false;
                    } else if exp.ty != TypeValue::Int {
                        ok = false;
                        let message = format!(
                            "Expected an expression of type 'int'. The expression type is '{}'.",
                            exp.ty
                        );
                        self.log_semantic(ctx, exp.span, SemanticCode::IncoherentTypes, &message);
                    }
                }

                Ok(ForActAttr { ok })
            }

            _ => {
                self.production(ctx, 27);
                Ok(ForActAttr { ok: true })
            }
        }
    }

    // ASS -> = | +=
    fn assign_op(&mut self, ctx: &mut Context) -> Result<AssignAttr, ParseAbort> {
        let cumulative = match self.current.kind {
            TokenKind::Assign => {
                self.production(ctx, 28);
                false
            }
            TokenKind::CumulativeAssign => {
                self.production(ctx, 29);
                true
            }
            _ => return self.syntax_error(SyntaxCode::AssignInvalid),
        };

        self.advance(ctx)?;
        Ok(AssignAttr { cumulative })
    }

    // CALLPARAMS -> EXP NEXTPARAMS | lambda
    fn call_params(&mut self, ctx: &mut Context) -> Result<ArgsAttr, ParseAbort> {
        match self.current.kind {
            TokenKind::ParenOpen
            | TokenKind::Cint
            | TokenKind::Cstr
            | TokenKind::False
            | TokenKind::True
            | TokenKind::Identifier => {
                self.production(ctx, 30);

                let exp = self.expr(ctx)?;
                let rest = self.next_params(ctx)?;

                let types = match (exp.ty, rest.types) {
                    (TypeValue::Error, _) | (_, None) => None,
                    (ty, Some(more)) => {
                        let mut types = vec![ty];
                        types.extend(more);
                        Some(types)
                    }
                };

                Ok(ArgsAttr { types })
            }

            _ => {
                self.production(ctx, 31);
                Ok(ArgsAttr {
                    types: Some(vec![TypeValue::Void]),
                })
            }
        }
    }

    // NEXTPARAMS -> , EXP NEXTPARAMS | lambda
    fn next_params(&mut self, ctx: &mut Context) -> Result<ArgsAttr, ParseAbort> {
        match self.current.kind {
            TokenKind::Comma => {
                self.production(ctx, 32);
                self.advance(ctx)?;

                let exp = self.expr(ctx)?;
                let rest = self.next_params(ctx)?;

                let types = match (exp.ty, rest.types) {
                    (TypeValue::Error, _) | (_, None) => None,
                    (ty, Some(more)) => {
                        let mut types = vec![ty];
                        types.extend(more);
                        Some(types)
                    }
                };

                Ok(ArgsAttr { types })
            }

            _ => {
                self.production(ctx, 33);
                Ok(ArgsAttr {
                    types: Some(Vec::new()),
                })
            }
        }
    }

    // RETEXP -> EXP | lambda
    fn ret_exp(&mut self, ctx: &mut Context) -> Result<RetExpAttr, ParseAbort> {
        match self.current.kind {
            TokenKind::ParenOpen
            | TokenKind::Cint
            | TokenKind::Cstr
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Identifier => {
                self.production(ctx, 34);
                let exp = self.expr(ctx)?;
                Ok(RetExpAttr { ty: exp.ty })
            }

            _ => {
                self.production(ctx, 35);
                Ok(RetExpAttr {
                    ty: TypeValue::Void,
                })
            }
        }
    }

    /// Join an operand with its logical-operator tail: the operand must
    /// be boolean when the tail is non-empty.
    fn join_logical(&self, ctx: &mut Context, lhs: ExprAttr, tail: ExprAttr) -> TypeValue {
        if !ctx.semantic {
            return TypeValue::Void;
        }
        if tail.ty == TypeValue::Void {
            return lhs.ty;
        }
        if lhs.ty.is_error() {
            return TypeValue::Error;
        }
        if lhs.ty != TypeValue::Bool {
            let message = format!(
                "A logical operator requires the expression to be of type 'boolean'. The \
                 expression type is '{}'.",
                lhs.ty
            );
            self.log_semantic(ctx, lhs.span, SemanticCode::InvalidType, &message);
            return TypeValue::Error;
        }
        if tail.ty.is_error() {
            return TypeValue::Error;
        }
        TypeValue::Bool
    }

    /// Join one logical-operator operand with the rest of its chain.
    fn join_logical_tail(&self, ctx: &mut Context, rhs: ExprAttr, rest: ExprAttr) -> TypeValue {
        if !ctx.semantic {
            return TypeValue::Void;
        }
        if rhs.ty.is_error() {
            return TypeValue::Error;
        }
        if rhs.ty != TypeValue::Bool {
            let message = format!(
                "A logical operator requires the expression to be of type 'boolean'. The \
                 expression type is '{}'.",
                rhs.ty
            );
            self.log_semantic(ctx, rhs.span, SemanticCode::InvalidType, &message);
            return TypeValue::Error;
        }
        if rest.ty.is_error() {
            return TypeValue::Error;
        }
        TypeValue::Bool
    }

    // EXP -> AND OR'
    fn expr(&mut self, ctx: &mut Context) -> Result<ExprAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::ParenOpen
            | TokenKind::Cstr
            | TokenKind::Cint
            | TokenKind::False
            | TokenKind::True
            | TokenKind::Identifier => {
                self.production(ctx, 36);

                let lhs = self.and_expr(ctx)?;
                let tail = self.or_tail(ctx)?;

                let span = self.close_span(opened);
                let ty = self.join_logical(ctx, lhs, tail);
                Ok(ExprAttr { ty, span })
            }

            _ => self.syntax_error(SyntaxCode::ExpInvalid),
        }
    }

    // OR' -> || AND OR' | lambda
    fn or_tail(&mut self, ctx: &mut Context) -> Result<ExprAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::Or => {
                self.production(ctx, 37);
                self.advance(ctx)?;

                let rhs = self.and_expr(ctx)?;
                let rest = self.or_tail(ctx)?;

                let span = self.close_span(opened);
                let ty = self.join_logical_tail(ctx, rhs, rest);
                Ok(ExprAttr { ty, span })
            }

            _ => {
                self.production(ctx, 38);
                Ok(ExprAttr {
                    ty: TypeValue::Void,
                    span: self.close_span(opened),
                })
            }
        }
    }

    // AND -> CMP AND'
    fn and_expr(&mut self, ctx: &mut Context) -> Result<ExprAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::ParenOpen
            | TokenKind::Cint
            | TokenKind::Cstr
            | TokenKind::False
            | TokenKind::True
            | TokenKind::Identifier => {
                self.production(ctx, 39);

                let lhs = self.cmp_expr(ctx)?;
                let tail = self.and_tail(ctx)?;

                let span = self.close_span(opened);
                let ty = self.join_logical(ctx, lhs, tail);
                Ok(ExprAttr { ty, span })
            }

            _ => self.syntax_error(SyntaxCode::ExpInvalid),
        }
    }

    // AND' -> && CMP AND' | lambda
    fn and_tail(&mut self, ctx: &mut Context) -> Result<ExprAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::And => {
                self.production(ctx, 40);
                self.advance(ctx)?;

                let rhs = self.cmp_expr(ctx)?;
                let rest = self.and_tail(ctx)?;

                let span = self.close_span(opened);
                let ty = self.join_logical_tail(ctx, rhs, rest);
                Ok(ExprAttr { ty, span })
            }

            _ => {
                self.production(ctx, 41);
                Ok(ExprAttr {
                    ty: TypeValue::Void,
                    span: self.close_span(opened),
                })
            }
        }
    }

    // CMP -> ADD CMP'
    fn cmp_expr(&mut self, ctx: &mut Context) -> Result<ExprAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::ParenOpen
            | TokenKind::Cint
            | TokenKind::Cstr
            | TokenKind::False
            | TokenKind::True
            | TokenKind::Identifier => {
                self.production(ctx, 42);

                let lhs = self.add_expr(ctx)?;
                let tail = self.cmp_tail(ctx)?;

                let span = self.close_span(opened);
                let ty = if !ctx.semantic {
                    TypeValue::Void
                } else if tail.ty == TypeValue::Void {
                    lhs.ty
                } else if lhs.ty.is_error() {
                    TypeValue::Error
                } else if lhs.ty != TypeValue::Int {
                    let message = format!(
                        "Only values of type 'int' can be compared. The current type is '{}'.",
                        lhs.ty
                    );
                    self.log_semantic(ctx, lhs.span, SemanticCode::InvalidType, &message);
                    TypeValue::Error
                } else if tail.ty.is_error() {
                    TypeValue::Error
                } else {
                    TypeValue::Bool
                };
                Ok(ExprAttr { ty, span })
            }

            _ => self.syntax_error(SyntaxCode::ExpInvalid),
        }
    }

    // CMP' -> CMPOP ADD CMP' | lambda
    fn cmp_tail(&mut self, ctx: &mut Context) -> Result<ExprAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::Greater | TokenKind::Less => {
                self.production(ctx, 43);
                self.cmp_op(ctx)?;

                let rhs = self.add_expr(ctx)?;
                let rest = self.cmp_tail(ctx)?;

                let span = self.close_span(opened);
                let ty = if !ctx.semantic {
                    TypeValue::Void
                } else if rhs.ty.is_error() {
                    TypeValue::Error
                } else if rhs.ty != TypeValue::Int {
                    let message = format!(
                        "Only values of type 'int' can be compared. The current type is '{}'.",
                        rhs.ty
                    );
                    self.log_semantic(ctx, rhs.span, SemanticCode::InvalidType, &message);
                    TypeValue::Error
                } else if rest.ty.is_error() {
                    TypeValue::Error
                } else {
                    TypeValue::Bool
                };
                Ok(ExprAttr { ty, span })
            }

            _ => {
                self.production(ctx, 44);
                Ok(ExprAttr {
                    ty: TypeValue::Void,
                    span: self.close_span(opened),
                })
            }
        }
    }

    // CMPOP -> > | <
    fn cmp_op(&mut self, ctx: &mut Context) -> Result<(), ParseAbort> {
        match self.current.kind {
            TokenKind::Greater => self.production(ctx, 45),
            TokenKind::Less => self.production(ctx, 46),
            _ => return self.syntax_error(SyntaxCode::CompareInvalid),
        }

        self.advance(ctx)
    }

    // ADD -> ATOM ADD'
    fn add_expr(&mut self, ctx: &mut Context) -> Result<ExprAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::ParenOpen
            | TokenKind::Cint
            | TokenKind::Cstr
            | TokenKind::False
            | TokenKind::True
            | TokenKind::Identifier => {
                self.production(ctx, 47);

                let lhs = self.atom(ctx)?;
                let tail = self.add_tail(ctx)?;

                let span = self.close_span(opened);
                let ty = if !ctx.semantic {
                    TypeValue::Void
                } else if tail.ty == TypeValue::Void {
                    lhs.ty
                } else if lhs.ty.is_error() {
                    TypeValue::Error
                } else if lhs.ty != TypeValue::Int && lhs.ty != TypeValue::Str {
                    let message = format!(
                        "An arithmetic operation requires type 'int' or 'string'. The \
                         current type is '{}'.",
                        lhs.ty
                    );
                    self.log_semantic(ctx, lhs.span, SemanticCode::InvalidType, &message);
                    TypeValue::Error
                } else if tail.ty.is_error() {
                    TypeValue::Error
                } else if lhs.ty != tail.ty {
                    let message = format!(
                        "The types do not match. The expression types are '{}' and '{}'.",
                        lhs.ty, tail.ty
                    );
                    self.log_semantic(ctx, span, SemanticCode::IncoherentTypes, &message);
                    TypeValue::Error
                } else {
                    tail.ty
                };
                Ok(ExprAttr { ty, span })
            }

            _ => self.syntax_error(SyntaxCode::ExpInvalid),
        }
    }

    // ADD' -> ADDOP ATOM ADD' | lambda
    fn add_tail(&mut self, ctx: &mut Context) -> Result<ExprAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::Sum | TokenKind::Sub => {
                self.production(ctx, 48);

                let op = self.add_op(ctx)?;
                let rhs = self.atom(ctx)?;
                let rest = self.add_tail(ctx)?;

                let span = self.close_span(opened);
                let ty = if !ctx.semantic {
                    TypeValue::Void
                } else if rhs.ty.is_error() {
                    TypeValue::Error
                } else if !op.is_sum && rhs.ty != TypeValue::Int {
                    let message = format!(
                        "Subtraction can only be applied to 'int' expressions, but the \
                         expression type is '{}'.",
                        rhs.ty
                    );
                    self.log_semantic(ctx, rhs.span, SemanticCode::InvalidType, &message);
                    TypeValue::Error
                } else if op.is_sum && rhs.ty != TypeValue::Int && rhs.ty != TypeValue::Str {
                    let message = format!(
                        "The '+' operator can only be applied to 'int' or 'string' \
                         expressions, but the expression type is '{}'.",
                        rhs.ty
                    );
                    self.log_semantic(ctx, rhs.span, SemanticCode::InvalidType, &message);
                    TypeValue::Error
                } else if rest.ty.is_error() {
                    TypeValue::Error
                } else if rest.ty != TypeValue::Void && rhs.ty != rest.ty {
                    let message = format!(
                        "The types do not match. The expression types are '{}' and '{}'.",
                        rhs.ty, rest.ty
                    );
                    self.log_semantic(
                        ctx,
                        rhs.span.merge(rest.span),
                        SemanticCode::IncoherentTypes,
                        &message,
                    );
                    TypeValue::Error
                } else {
                    rhs.ty
                };
                Ok(ExprAttr { ty, span })
            }

            _ => {
                self.production(ctx, 49);
                Ok(ExprAttr {
                    ty: TypeValue::Void,
                    span: self.close_span(opened),
                })
            }
        }
    }

    // ADDOP -> + | -
    fn add_op(&mut self, ctx: &mut Context) -> Result<AddOpAttr, ParseAbort> {
        let is_sum = match self.current.kind {
            TokenKind::Sum => {
                self.production(ctx, 50);
                true
            }
            TokenKind::Sub => {
                self.production(ctx, 51);
                false
            }
            _ => return self.syntax_error(SyntaxCode::ArithInvalid),
        };

        self.advance(ctx)?;
        Ok(AddOpAttr { is_sum })
    }

    // ATOM -> id IDVAL | ( EXP ) | cint | cstr | true | false
    fn atom(&mut self, ctx: &mut Context) -> Result<ExprAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::Identifier => {
                self.production(ctx, 52);
                let id = self.current.clone();
                self.advance(ctx)?;

                let idval = self.id_val(ctx)?;

                let span = self.close_span(opened);
                let ty = if !ctx.semantic {
                    TypeValue::Void
                } else {
                    let declared = ctx.scopes.get_type(id.symbol_ref());

                    match idval.suffix {
                        IdSuffix::Call(args) => {
                            if !declared.is_function() {
                                self.log_semantic(
                                    ctx,
                                    span,
                                    SemanticCode::VariableCalledAsFunction,
                                    "A variable cannot be called as if it were a function.",
                                );
                                TypeValue::Error
                            } else {
                                match args {
                                    None => TypeValue::Error,
                                    Some(given) => {
                                        if given == declared.arg_types() {
                                            declared.return_type()
                                        } else {
                                            let message = format!(
                                                "The call argument types do not match the \
                                                 function definition. Expected {}, got {}.",
                                                TypeValue::render_list(&declared.arg_types()),
                                                TypeValue::render_list(&given)
                                            );
                                            self.log_semantic(
                                                ctx,
                                                idval.span,
                                                SemanticCode::IncoherentCallParamTypes,
                                                &message,
                                            );
                                            TypeValue::Error
                                        }
                                    }
                                }
                            }
                        }

                        IdSuffix::Plain => {
                            if declared.is_function() {
                                self.log_semantic(
                                    ctx,
                                    span,
                                    SemanticCode::FunctionUsedAsVariable,
                                    "A function cannot be used as a variable.",
                                );
                                TypeValue::Error
                            } else {
                                declared
                            }
                        }

                        IdSuffix::Assign(_) => unreachable!("IDVAL never assigns"),
                    }
                };

                Ok(ExprAttr { ty, span })
            }

            TokenKind::ParenOpen => {
                self.production(ctx, 53);
                self.advance(ctx)?;

                let exp = self.expr(ctx)?;

                self.expect(TokenKind::ParenClose, SyntaxCode::ExpMissingParenClose)?;
                self.advance(ctx)?;

                Ok(ExprAttr {
                    ty: exp.ty,
                    span: self.close_span(opened),
                })
            }

            TokenKind::Cint => {
                self.production(ctx, 54);
                self.literal_atom(ctx, TypeValue::Int, opened)
            }

            TokenKind::Cstr => {
                self.production(ctx, 55);
                self.literal_atom(ctx, TypeValue::Str, opened)
            }

            TokenKind::True => {
                self.production(ctx, 56);
                self.literal_atom(ctx, TypeValue::Bool, opened)
            }

            TokenKind::False => {
                self.production(ctx, 57);
                self.literal_atom(ctx, TypeValue::Bool, opened)
            }

            _ => self.syntax_error(SyntaxCode::ExpInvalid),
        }
    }

    /// Shared tail of the literal atoms: consume the token, synthesize
    /// the literal's type.
    fn literal_atom(
        &mut self,
        ctx: &mut Context,
        ty: TypeValue,
        opened: SourceSpan,
    ) -> Result<ExprAttr, ParseAbort> {
        self.advance(ctx)?;
        Ok(ExprAttr {
            ty: if ctx.semantic { ty } else { TypeValue::Void },
            span: self.close_span(opened),
        })
    }

    // IDVAL -> ( CALLPARAMS ) | lambda
    fn id_val(&mut self, ctx: &mut Context) -> Result<IdSuffixAttr, ParseAbort> {
        let opened = self.open_span();

        match self.current.kind {
            TokenKind::ParenOpen => {
                self.production(ctx, 58);
                self.advance(ctx)?;

                let args = self.call_params(ctx)?;

                self.expect(TokenKind::ParenClose, SyntaxCode::CallMissingParenClose)?;
                self.advance(ctx)?;

                Ok(IdSuffixAttr {
                    suffix: IdSuffix::Call(args.types),
                    span: self.close_span(opened),
                })
            }

            _ => {
                self.production(ctx, 59);
                Ok(IdSuffixAttr {
                    suffix: IdSuffix::Plain,
                    span: self.close_span(opened),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorManager;
    use core_types::RunStatus;
    use std::io;

    fn run(source: &str, semantic: bool, trace: TraceMode) -> (Result<(), FatalError>, Context, String) {
        let mut ctx = Context::new(semantic, trace);
        ctx.errors = ErrorManager::with_sink(Box::new(io::sink()));
        let mut parser = Parser::new(source.as_bytes());
        let result = parser.parse(&mut ctx);
        let output = parser.output().to_string();
        (result, ctx, output)
    }

    #[test]
    fn test_trace_var_declaration() {
        let (result, ctx, output) = run("var int x;", false, TraceMode::Productions);
        assert!(result.is_ok());
        assert_eq!(ctx.errors.status(), RunStatus::Clean);
        assert_eq!(output, " 2 18 7 3");
    }

    #[test]
    fn test_trace_assignment_with_sum() {
        let (result, _ctx, output) = run("x = 1 + 2;", false, TraceMode::Productions);
        assert!(result.is_ok());
        assert_eq!(output, " 2 19 20 24 28 36 39 42 47 54 48 50 54 49 44 41 38 3");
    }

    #[test]
    fn test_trace_empty_function() {
        let (result, _ctx, output) = run("function void f(void) { }", false, TraceMode::Productions);
        assert!(result.is_ok());
        assert_eq!(output, " 1 4 5 10 15 3");
    }

    #[test]
    fn test_syntax_error_stops_parse() {
        let (result, ctx, _output) = run("if x { }", false, TraceMode::None);
        assert_eq!(result, Err(FatalError));
        assert_eq!(ctx.errors.status(), RunStatus::Unrecoverable);
    }

    #[test]
    fn test_semantic_clean_program() {
        let source = "\
function int doble(int n) {
    return n + n;
}
var int x;
x = doble(4);
";
        let (result, ctx, _output) = run(source, true, TraceMode::None);
        assert!(result.is_ok());
        assert_eq!(ctx.errors.status(), RunStatus::Clean);
    }

    #[test]
    fn test_if_condition_type_error_recovers() {
        // The bad condition is reported but the rest is still checked.
        let source = "if (1) output 'x';\nvar boolean b;\n";
        let (result, ctx, _output) = run(source, true, TraceMode::None);
        assert!(result.is_ok());
        assert_eq!(ctx.errors.status(), RunStatus::Recovered);
    }

    #[test]
    fn test_for_loop_checks_clean() {
        let source = "var int i;\nfor (i = 0; i < 10; i += 1) { }\n";
        let (result, ctx, _output) = run(source, true, TraceMode::None);
        assert!(result.is_ok());
        assert_eq!(ctx.errors.status(), RunStatus::Clean);
    }

    #[test]
    fn test_call_argument_mismatch() {
        let source = "\
function int f(int x) {
    return x;
}
var int y;
y = f(1, 'a');
";
        let (result, ctx, _output) = run(source, true, TraceMode::None);
        assert!(result.is_ok());
        assert_eq!(ctx.errors.status(), RunStatus::Recovered);
    }

    #[test]
    fn test_duplicate_declaration_in_one_scope() {
        let source = "var int x;\nvar string x;\n";
        let (result, ctx, _output) = run(source, true, TraceMode::None);
        assert!(result.is_ok());
        assert_eq!(ctx.errors.status(), RunStatus::Recovered);
    }

    #[test]
    fn test_parameter_shadows_global() {
        let source = "\
var int x;
function void f(int x) {
    x = 3;
}
";
        let (result, ctx, _output) = run(source, true, TraceMode::None);
        assert!(result.is_ok());
        assert_eq!(ctx.errors.status(), RunStatus::Clean);
    }

    #[test]
    fn test_error_type_is_absorbing() {
        // One diagnostic for the bad operand, none for the chain around it.
        let sink = std::sync::Arc::new(std::sync::Mutex::new(Vec::<u8>::new()));

        struct SharedSink(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
        impl io::Write for SharedSink {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut ctx = Context::new(true, TraceMode::None);
        ctx.errors = ErrorManager::with_sink(Box::new(SharedSink(sink.clone())));
        let mut parser = Parser::new("var boolean b;\nb = 1 + true + 2;\n".as_bytes());
        parser.parse(&mut ctx).unwrap();

        let output = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        let diagnostics = output
            .lines()
            .filter(|line| line.contains("UE-"))
            .count();
        assert_eq!(diagnostics, 1, "expected one diagnostic, got:\n{output}");
    }

    #[test]
    fn test_function_table_dumped_on_close() {
        let source = "function void f(int a) { }";
        let (result, _ctx, output) = run(source, true, TraceMode::Tables);
        assert!(result.is_ok());
        assert!(output.contains("#1:\n*'a'\n"), "got {output:?}");
        assert!(output.contains("+type:'int'"));
        assert!(output.contains("+offset:0"));
    }

    #[test]
    fn test_return_type_mismatch() {
        let source = "function int f(void) { return 'nope'; }";
        let (result, ctx, _output) = run(source, true, TraceMode::None);
        assert!(result.is_ok());
        assert_eq!(ctx.errors.status(), RunStatus::Recovered);
    }

    #[test]
    fn test_void_call_argument_matches_empty_params() {
        // A void-returning call used as the only argument matches a
        // paramless signature: both sides carry the void placeholder.
        let source = "\
function void g(void) {
}
function int f(void) {
    return 1;
}
var int y;
y = f(g());
";
        let (result, ctx, _output) = run(source, true, TraceMode::None);
        assert!(result.is_ok());
        assert_eq!(ctx.errors.status(), RunStatus::Clean);
    }
}
