//! Statement productions: suites, simple statements and compound statements.

use crate::error::{ErrorKind, ParseResult};
use crate::parser::args::ArgDefListBuilder;
use crate::parser::builder::{Nesting, Parser};
use crate::parser::factory::NodeFactory;
use crate::parser::lexer::{Token, TokenKind as T};
use crate::parser::scope::ScopeKind;
use crate::parser::targets::TargetContext;
use crate::sst::{
    Alias, ClassDef, ExceptHandler, FunctionDef, Node, NodeKind, Offset, Param, Parameters, Span,
    WithItem,
};

impl<'src, F: NodeFactory + ?Sized> Parser<'src, '_, F> {
    // ── Inputs ────────────────────────────────────────────────────────────────

    /// `file_input`: statements up to EOF. Pushes them on the value stack.
    pub(super) fn parse_file_input(&mut self) -> ParseResult<()> {
        loop {
            match self.peek_kind() {
                T::Newline => {
                    self.bump();
                }
                T::Eof => return Ok(()),
                _ => self.parse_statement()?,
            }
        }
    }

    /// `single_input`: at most one statement (a `;`-separated line counts as
    /// one), surrounded by blank lines.
    pub(super) fn parse_single_input(&mut self) -> ParseResult<()> {
        while self.eat(T::Newline) {}
        if self.at(T::Eof) {
            return Ok(());
        }
        self.parse_statement()?;
        while self.eat(T::Newline) {}
        let tok = self.peek();
        if tok.kind != T::Eof {
            if tok.kind.is_error() {
                return Err(self.unexpected(tok));
            }
            return Err(self.error_at_token(
                &tok,
                ErrorKind::Grammar,
                "multiple statements found while compiling a single statement",
            ));
        }
        Ok(())
    }

    // ── Statement dispatch ────────────────────────────────────────────────────

    /// Parse one statement line and push the resulting node(s).
    pub(super) fn parse_statement(&mut self) -> ParseResult<()> {
        let start = self.peek().start;
        let node = match self.peek_kind() {
            T::KwIf => self.parse_if()?,
            T::KwWhile => self.parse_while()?,
            T::KwFor => self.parse_for(start, false)?,
            T::KwTry => self.parse_try()?,
            T::KwWith => self.parse_with(start, false)?,
            T::KwDef => self.parse_funcdef(start, Vec::new(), false)?,
            T::KwClass => self.parse_classdef(start, Vec::new())?,
            T::At => self.parse_decorated()?,
            T::KwAsync => self.parse_async_stmt(start, Vec::new())?,
            _ => return self.parse_simple_statements(),
        };
        self.stacks.push_value(node);
        Ok(())
    }

    fn parse_simple_statements(&mut self) -> ParseResult<()> {
        loop {
            let node = self.parse_small_statement()?;
            self.stacks.push_value(node);
            if !self.eat(T::Semicolon) || self.at(T::Newline) {
                break;
            }
        }
        self.expect_newline()
    }

    fn parse_small_statement(&mut self) -> ParseResult<Node> {
        let tok = self.peek();
        match tok.kind {
            T::KwPass => {
                self.bump();
                Ok(Node::new(NodeKind::Pass, self.span_from(tok.start)))
            }
            T::KwBreak => {
                self.bump();
                if !self.loops.mark_break() {
                    return Err(self.error_at_token(&tok, ErrorKind::Semantic, "'break' outside loop"));
                }
                Ok(Node::new(NodeKind::Break, self.span_from(tok.start)))
            }
            T::KwContinue => {
                self.bump();
                if !self.loops.mark_continue() {
                    return Err(self.error_at_token(
                        &tok,
                        ErrorKind::Semantic,
                        "'continue' not properly in loop",
                    ));
                }
                Ok(Node::new(NodeKind::Continue, self.span_from(tok.start)))
            }
            T::KwReturn => self.parse_return(),
            T::KwRaise => self.parse_raise(),
            T::KwGlobal => self.parse_global(),
            T::KwNonlocal => self.parse_nonlocal(),
            T::KwDel => self.parse_del(),
            T::KwAssert => self.parse_assert(),
            T::KwImport => self.parse_import(),
            T::KwFrom => self.parse_from_import(),
            _ => self.parse_expr_stmt(),
        }
    }

    // ── Suites ────────────────────────────────────────────────────────────────

    /// `':' suite`
    pub(super) fn parse_block(&mut self) -> ParseResult<Vec<Node>> {
        self.expect(T::Colon)?;
        self.parse_suite()
    }

    /// A simple statement line, or NEWLINE INDENT statements DEDENT.
    pub(super) fn parse_suite(&mut self) -> ParseResult<Vec<Node>> {
        let tok = self.peek();
        self.nested(&tok, Nesting::Block, Self::parse_suite_body)
    }

    fn parse_suite_body(&mut self) -> ParseResult<Vec<Node>> {
        self.collect(|p| {
            if !p.at(T::Newline) {
                return p.parse_simple_statements();
            }
            p.bump();
            let tok = p.peek();
            if tok.kind != T::Indent {
                if tok.kind.is_error() || p.is_incomplete_at(&tok) {
                    return Err(p.unexpected(tok));
                }
                return Err(p.error_at_token(
                    &tok,
                    ErrorKind::Indentation,
                    "expected an indented block",
                ));
            }
            p.bump();
            loop {
                match p.peek_kind() {
                    T::Dedent => {
                        p.bump();
                        return Ok(());
                    }
                    T::Eof => return Ok(()),
                    T::Newline => {
                        p.bump();
                    }
                    _ => p.parse_statement()?,
                }
            }
        })
    }

    fn parse_else_block(&mut self) -> ParseResult<Vec<Node>> {
        if self.eat(T::KwElse) {
            self.parse_block()
        } else {
            Ok(Vec::new())
        }
    }

    // ── Simple statements ─────────────────────────────────────────────────────

    fn parse_return(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        if !self.scopes.current_scope().kind.is_function() {
            return Err(self.error_at_token(&tok, ErrorKind::Semantic, "'return' outside function"));
        }
        let value = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_testlist_star_expr()?.boxed())
        };
        Ok(Node::new(NodeKind::Return(value), self.span_from(tok.start)))
    }

    fn parse_raise(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        let mut exc = None;
        let mut cause = None;
        if !self.at_statement_end() {
            exc = Some(self.parse_test()?.boxed());
            if self.eat(T::KwFrom) {
                cause = Some(self.parse_test()?.boxed());
            }
        }
        Ok(Node::new(NodeKind::Raise { exc, cause }, self.span_from(tok.start)))
    }

    fn parse_name_list(&mut self) -> ParseResult<Vec<(&'src str, Token<'src>)>> {
        let mut names = vec![self.expect_name()?];
        while self.eat(T::Comma) {
            names.push(self.expect_name()?);
        }
        Ok(names)
    }

    fn parse_global(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        let names = self.parse_name_list()?;
        for (name, name_tok) in &names {
            let scope = self.scopes.current_scope();
            let conflict = if scope.params.iter().any(|p| p == name) {
                Some(format!("name '{name}' is parameter and global"))
            } else if scope.nonlocals.contains(*name) {
                Some(format!("name '{name}' is nonlocal and global"))
            } else if scope.declares(name) {
                Some(format!("name '{name}' is assigned to before global declaration"))
            } else if scope.seen.contains(*name) {
                Some(format!("name '{name}' is used prior to global declaration"))
            } else {
                None
            };
            if let Some(message) = conflict {
                return Err(self.error_at_token(name_tok, ErrorKind::Semantic, message));
            }
            self.scopes.register_global(name);
        }
        let names = names.into_iter().map(|(n, _)| n.to_string()).collect();
        Ok(Node::new(NodeKind::Global(names), self.span_from(tok.start)))
    }

    fn parse_nonlocal(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        if self.scopes.current_scope().kind == ScopeKind::Module {
            return Err(self.error_at_token(
                &tok,
                ErrorKind::Semantic,
                "nonlocal declaration not allowed at module level",
            ));
        }
        let names = self.parse_name_list()?;
        for (name, name_tok) in &names {
            let scope = self.scopes.current_scope();
            let conflict = if scope.params.iter().any(|p| p == name) {
                Some(format!("name '{name}' is parameter and nonlocal"))
            } else if scope.globals.contains(*name) {
                Some(format!("name '{name}' is nonlocal and global"))
            } else if scope.declares(name) {
                Some(format!("name '{name}' is assigned to before nonlocal declaration"))
            } else if scope.seen.contains(*name) {
                Some(format!("name '{name}' is used prior to nonlocal declaration"))
            } else {
                None
            };
            if let Some(message) = conflict {
                return Err(self.error_at_token(name_tok, ErrorKind::Semantic, message));
            }
            self.scopes.register_nonlocal(name);
            self.defer_nonlocal(name, Span::new(name_tok.start, name_tok.stop));
        }
        let names = names.into_iter().map(|(n, _)| n.to_string()).collect();
        Ok(Node::new(NodeKind::Nonlocal(names), self.span_from(tok.start)))
    }

    fn parse_del(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        // `del a, b` deletes two targets; `del (a, b)` deletes one tuple.
        let (targets, _) = self.parse_exprlist_items()?;
        for target in &targets {
            self.check_store_target(target, TargetContext::Delete)?;
        }
        Ok(Node::new(NodeKind::Delete(targets), self.span_from(tok.start)))
    }

    fn parse_assert(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        let test = self.parse_test()?.boxed();
        let msg = if self.eat(T::Comma) {
            Some(self.parse_test()?.boxed())
        } else {
            None
        };
        Ok(Node::new(NodeKind::Assert { test, msg }, self.span_from(tok.start)))
    }

    // ── Imports ───────────────────────────────────────────────────────────────

    /// `a.b.c`: returns the full dotted name and its first component.
    fn parse_dotted_name(&mut self) -> ParseResult<(String, &'src str)> {
        let (first, _) = self.expect_name()?;
        let mut full = first.to_string();
        while self.eat(T::Dot) {
            let (part, _) = self.expect_name()?;
            full.push('.');
            full.push_str(part);
        }
        Ok((full, first))
    }

    fn parse_import(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        let mut names = Vec::new();
        loop {
            let start = self.peek().start;
            let (name, first) = self.parse_dotted_name()?;
            let asname = if self.eat(T::KwAs) {
                Some(self.expect_name()?.0.to_string())
            } else {
                None
            };
            self.scopes.create_local(asname.as_deref().unwrap_or(first));
            names.push(Alias {
                name,
                asname,
                start,
                end: self.prev_end,
            });
            if !self.eat(T::Comma) {
                break;
            }
        }
        let span = self.span_from(tok.start);
        Ok(self.factory.import(names, span))
    }

    fn parse_from_import(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        let mut level = 0u32;
        loop {
            match self.peek_kind() {
                T::Dot => level += 1,
                T::Ellipsis => level += 3,
                _ => break,
            }
            self.bump();
        }
        let module = if self.at(T::Name) || level == 0 {
            Some(self.parse_dotted_name()?.0)
        } else {
            None
        };
        self.expect(T::KwImport)?;

        let mut names = Vec::new();
        let star = self.peek();
        if star.kind == T::Star {
            self.bump();
            if self.scopes.current_scope().kind != ScopeKind::Module {
                return Err(self.error_at_token(
                    &star,
                    ErrorKind::Semantic,
                    "import * only allowed at module level",
                ));
            }
        } else {
            let parens = self.eat(T::LParen);
            loop {
                let (name, name_tok) = self.expect_name()?;
                let asname = if self.eat(T::KwAs) {
                    Some(self.expect_name()?.0.to_string())
                } else {
                    None
                };
                self.scopes.create_local(asname.as_deref().unwrap_or(name));
                names.push(Alias {
                    name: name.to_string(),
                    asname,
                    start: name_tok.start,
                    end: self.prev_end,
                });
                let comma = self.peek();
                if !self.eat(T::Comma) {
                    break;
                }
                if parens && self.at(T::RParen) {
                    break;
                }
                if !parens && self.at_statement_end() {
                    return Err(self.error_at_token(
                        &comma,
                        ErrorKind::Grammar,
                        "trailing comma not allowed without surrounding parentheses",
                    ));
                }
            }
            if parens {
                self.expect(T::RParen)?;
            }
        }
        let span = self.span_from(tok.start);
        Ok(self.factory.import_from(module, names, level, span))
    }

    // ── Expression statements ─────────────────────────────────────────────────

    fn parse_expr_stmt(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let first = if self.at(T::KwYield) {
            self.parse_yield_expr()?
        } else {
            self.parse_testlist_star_expr()?
        };
        match self.peek_kind() {
            T::Colon => self.finish_annotated(start, first),
            T::AugAssign(op) => {
                self.bump();
                self.check_aug_target(&first)?;
                let value = if self.at(T::KwYield) {
                    self.parse_yield_expr()?
                } else {
                    self.parse_testlist()?
                };
                Ok(Node::new(
                    NodeKind::AugAssign {
                        target: first.boxed(),
                        op,
                        value: value.boxed(),
                    },
                    self.span_from(start),
                ))
            }
            T::Assign => self.finish_assignment(start, first),
            _ => {
                self.reject_bare_starred(&first)?;
                let span = self.span_from(start);
                // Interactive top-level expressions display their value.
                if self.interactive && self.scopes.current_scope().kind == ScopeKind::Module {
                    return Ok(Node::new(NodeKind::PrintExpr(first.boxed()), span));
                }
                Ok(Node::new(NodeKind::Expr(first.boxed()), span))
            }
        }
    }

    fn parse_assigned_value(&mut self) -> ParseResult<Node> {
        if self.at(T::KwYield) {
            self.parse_yield_expr()
        } else {
            self.parse_testlist_star_expr()
        }
    }

    fn finish_assignment(&mut self, start: Offset, first: Node) -> ParseResult<Node> {
        let mut targets = vec![first];
        let value = loop {
            self.bump();
            let rhs = self.parse_assigned_value()?;
            if self.at(T::Assign) {
                targets.push(rhs);
            } else {
                break rhs;
            }
        };
        for target in &targets {
            self.check_store_target(target, TargetContext::Assign)?;
        }
        self.reject_bare_starred(&value)?;
        let span = self.span_from(start);
        Ok(self.factory.assignment(targets, value, span))
    }

    fn finish_annotated(&mut self, start: Offset, target: Node) -> ParseResult<Node> {
        self.bump();
        let message = match &target.kind {
            NodeKind::Name(_) | NodeKind::Attribute { .. } | NodeKind::Subscript { .. } => None,
            NodeKind::Tuple(_) => Some("only single target (not tuple) can be annotated"),
            NodeKind::List(_) => Some("only single target (not list) can be annotated"),
            _ => Some("illegal target for annotation"),
        };
        if let Some(message) = message {
            return Err(self.error_at(target.span(), ErrorKind::Semantic, message));
        }
        let annotation = self.parse_test()?.boxed();
        let value = if self.eat(T::Assign) {
            Some(self.parse_assigned_value()?.boxed())
        } else {
            None
        };
        self.check_store_target(&target, TargetContext::Assign)?;
        self.scopes.set_has_annotations();
        // `(x): int` is not simple: the statement starts at the parenthesis.
        let simple = matches!(target.kind, NodeKind::Name(_)) && target.start == start;
        Ok(Node::new(
            NodeKind::AnnAssign {
                target: target.boxed(),
                annotation,
                value,
                simple,
            },
            self.span_from(start),
        ))
    }

    // ── Compound statements ───────────────────────────────────────────────────

    /// `if` / `elif` chains; an `elif` becomes a nested `If` in `orelse`.
    fn parse_if(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        let test = self.parse_namedexpr_test()?.boxed();
        let body = self.parse_block()?;
        let orelse = match self.peek_kind() {
            T::KwElif => vec![self.parse_if()?],
            _ => self.parse_else_block()?,
        };
        Ok(Node::new(
            NodeKind::If { test, body, orelse },
            self.span_from(tok.start),
        ))
    }

    fn parse_while(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        let test = self.parse_namedexpr_test()?.boxed();
        self.expect(T::Colon)?;
        let (body, flags) = self.loop_body()?;
        let orelse = self.parse_else_block()?;
        Ok(Node::new(
            NodeKind::While {
                test,
                body,
                orelse,
                flags,
            },
            self.span_from(tok.start),
        ))
    }

    fn parse_for(&mut self, start: Offset, is_async: bool) -> ParseResult<Node> {
        self.expect(T::KwFor)?;
        let target = self.parse_exprlist()?;
        self.check_store_target(&target, TargetContext::For)?;
        self.expect(T::KwIn)?;
        let iter = self.parse_testlist()?;
        self.expect(T::Colon)?;
        let (body, flags) = self.loop_body()?;
        let orelse = self.parse_else_block()?;
        Ok(Node::new(
            NodeKind::For {
                target: target.boxed(),
                iter: iter.boxed(),
                body,
                orelse,
                is_async,
                flags,
            },
            self.span_from(start),
        ))
    }

    fn parse_try(&mut self) -> ParseResult<Node> {
        let tok = self.bump();
        let body = self.parse_block()?;
        let mut handlers: Vec<ExceptHandler> = Vec::new();
        while self.at(T::KwExcept) {
            let except = self.bump();
            if handlers.last().is_some_and(|h| h.type_expr.is_none()) {
                return Err(self.error_at_token(
                    &except,
                    ErrorKind::Semantic,
                    "default 'except:' must be last",
                ));
            }
            let mut type_expr = None;
            let mut name = None;
            if !self.at(T::Colon) {
                type_expr = Some(self.parse_test()?);
                if self.eat(T::KwAs) {
                    let (bound, _) = self.expect_name()?;
                    self.scopes.create_local(bound);
                    name = Some(bound.to_string());
                }
            }
            let handler_body = self.parse_block()?;
            handlers.push(ExceptHandler {
                type_expr,
                name,
                body: handler_body,
                start: except.start,
                end: self.prev_end,
            });
        }
        let orelse = if handlers.is_empty() {
            Vec::new()
        } else {
            self.parse_else_block()?
        };
        let finalbody = if self.eat(T::KwFinally) {
            self.parse_block()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finalbody.is_empty() {
            let tok = self.peek();
            if tok.kind.is_error() || self.is_incomplete_at(&tok) {
                return Err(self.unexpected(tok));
            }
            return Err(self.error_at_token(
                &tok,
                ErrorKind::Grammar,
                "expected 'except' or 'finally' block",
            ));
        }
        Ok(Node::new(
            NodeKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            },
            self.span_from(tok.start),
        ))
    }

    fn parse_with(&mut self, start: Offset, is_async: bool) -> ParseResult<Node> {
        self.expect(T::KwWith)?;
        let mut items = Vec::new();
        loop {
            let context = self.parse_test()?;
            let target = if self.eat(T::KwAs) {
                let target = self.parse_expr()?;
                self.check_store_target(&target, TargetContext::With)?;
                Some(target)
            } else {
                None
            };
            items.push(WithItem { context, target });
            if !self.eat(T::Comma) {
                break;
            }
        }
        let body = self.parse_block()?;
        let span = self.span_from(start);
        Ok(self.factory.with_statement(items, body, is_async, span))
    }

    fn parse_async_stmt(&mut self, start: Offset, decorators: Vec<Node>) -> ParseResult<Node> {
        self.bump();
        match self.peek_kind() {
            T::KwDef => self.parse_funcdef(start, decorators, true),
            T::KwFor if decorators.is_empty() => self.parse_for(start, true),
            T::KwWith if decorators.is_empty() => self.parse_with(start, true),
            _ => {
                let tok = self.peek();
                Err(self.unexpected(tok))
            }
        }
    }

    fn parse_decorated(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let decorators = self.collect(|p| {
            while p.eat(T::At) {
                let decorator = p.parse_namedexpr_test()?;
                p.stacks.push_value(decorator);
                p.expect_newline()?;
            }
            Ok(())
        })?;
        match self.peek_kind() {
            T::KwDef => self.parse_funcdef(start, decorators, false),
            T::KwClass => self.parse_classdef(start, decorators),
            T::KwAsync => self.parse_async_stmt(start, decorators),
            _ => {
                let tok = self.peek();
                Err(self.unexpected(tok))
            }
        }
    }

    // ── Definitions ───────────────────────────────────────────────────────────

    fn parse_funcdef(
        &mut self,
        start: Offset,
        decorators: Vec<Node>,
        is_async: bool,
    ) -> ParseResult<Node> {
        self.expect(T::KwDef)?;
        let (name, _) = self.expect_name()?;
        self.scopes.create_local(name);
        let (scope, (params, returns, body)) =
            self.with_scope(name, ScopeKind::Function, |p| {
                p.expect(T::LParen)?;
                let params = p.parse_parameters(T::RParen, true)?;
                p.expect(T::RParen)?;
                let returns = if p.eat(T::Arrow) {
                    Some(p.in_enclosing_scope(|p| p.parse_test())?)
                } else {
                    None
                };
                p.expect(T::Colon)?;
                let body = p.with_boundary(|p| p.parse_suite())?;
                Ok((params, returns, body))
            })?;
        let def = FunctionDef {
            name: name.to_string(),
            params,
            returns,
            decorators,
            body,
            is_async,
            scope,
        };
        let span = self.span_from(start);
        Ok(self.factory.function_def(def, span))
    }

    fn parse_classdef(&mut self, start: Offset, decorators: Vec<Node>) -> ParseResult<Node> {
        self.expect(T::KwClass)?;
        let (name, _) = self.expect_name()?;
        let (bases, keywords) = if self.eat(T::LParen) {
            let args = self.parse_arglist(T::RParen)?;
            self.expect(T::RParen)?;
            args
        } else {
            (Vec::new(), Vec::new())
        };
        self.scopes.create_local(name);
        let (scope, body) = self.with_scope(name, ScopeKind::Class, |p| {
            p.expect(T::Colon)?;
            p.with_boundary(|p| p.parse_suite())
        })?;
        let def = ClassDef {
            name: name.to_string(),
            bases,
            keywords,
            decorators,
            body,
            scope,
        };
        let span = self.span_from(start);
        Ok(self.factory.class_def(def, span))
    }

    /// Parameters of a `def` (closed by `)`, annotations allowed) or a
    /// `lambda` (closed by `:`). Runs inside the new function scope; default
    /// values and annotations are evaluated in the enclosing one.
    pub(super) fn parse_parameters(
        &mut self,
        close: T,
        annotations: bool,
    ) -> ParseResult<Parameters> {
        let mut builder = ArgDefListBuilder::new();
        while !self.at(close) {
            let tok = self.peek();
            let added = match tok.kind {
                T::Slash => {
                    self.bump();
                    builder.mark_positional_only()
                }
                T::Star => {
                    self.bump();
                    if self.at(T::Comma) || self.at(close) {
                        builder.add_star(None)
                    } else {
                        let param = self.parse_param(annotations, false)?;
                        builder.add_star(Some(param))
                    }
                }
                T::DoubleStar => {
                    self.bump();
                    let param = self.parse_param(annotations, false)?;
                    builder.add_kwarg(param)
                }
                _ => {
                    let param = self.parse_param(annotations, true)?;
                    builder.add_param(param)
                }
            };
            added.map_err(|message| {
                self.error_at(self.span_from(tok.start), ErrorKind::Semantic, message)
            })?;
            if !self.eat(T::Comma) {
                break;
            }
        }
        let positional_only = builder.has_positional_only();
        let close_tok = self.peek();
        let params = builder
            .finish()
            .map_err(|message| self.error_at_token(&close_tok, ErrorKind::Semantic, message))?;
        if positional_only {
            self.scopes.mark_positional_only();
        }
        for name in params.names() {
            self.scopes.create_param(name);
        }
        Ok(params)
    }

    fn parse_param(&mut self, annotations: bool, allow_default: bool) -> ParseResult<Param> {
        let (name, tok) = self.expect_name()?;
        let annotation = if annotations && self.eat(T::Colon) {
            Some(self.in_enclosing_scope(|p| p.parse_test())?)
        } else {
            None
        };
        let default = if allow_default && self.eat(T::Assign) {
            Some(self.in_enclosing_scope(|p| p.parse_test())?)
        } else {
            None
        };
        Ok(Param {
            name: name.to_string(),
            annotation,
            default,
            start: tok.start,
            end: self.prev_end,
        })
    }
}
