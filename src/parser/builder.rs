//! Builder state shared by the statement and expression productions.
//!
//! The grammar is split over three files that all extend [`Parser`]:
//! `stmt.rs` (statements and suites), `expr.rs` (the expression precedence
//! chain, displays, strings) and `targets.rs` (assignment target checks).
//! This file holds the state they share, the token plumbing, error mapping,
//! and the guard helpers that keep the scope stack, the loop state and the
//! value stack balanced when a production fails halfway.

use tracing::debug;

use crate::error::{ErrorKind, ParseError, ParseResult};
use crate::parser::factory::NodeFactory;
use crate::parser::lexer::{Lexer, Token, TokenKind};
use crate::parser::loop_state::LoopTracker;
use crate::parser::scope::{ScopeEnvironment, ScopeId, ScopeKind};
use crate::parser::stacks::BuilderStacks;
use crate::parser::strings;
use crate::sst::{LoopFlags, Node, Offset, Span};

/// Brackets open at once, as in CPython's tokenizer.
const MAX_BRACKET_DEPTH: usize = 200;
/// Nested indented blocks.
const MAX_BLOCK_DEPTH: usize = 100;
/// Other self-recursive expression forms: unary operators, `not`,
/// conditional expressions, lambda bodies and `**` exponents.
const MAX_EXPRESSION_DEPTH: usize = 1000;

/// What a level of recursion is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Nesting {
    Bracket,
    Block,
    Expression,
}

#[derive(Debug, Clone, Copy, Default)]
struct NestingDepth {
    brackets: usize,
    blocks: usize,
    expressions: usize,
}

impl NestingDepth {
    fn counter(&mut self, nesting: Nesting) -> (&mut usize, usize) {
        match nesting {
            Nesting::Bracket => (&mut self.brackets, MAX_BRACKET_DEPTH),
            Nesting::Block => (&mut self.blocks, MAX_BLOCK_DEPTH),
            Nesting::Expression => (&mut self.expressions, MAX_EXPRESSION_DEPTH),
        }
    }
}

/// A `nonlocal` declaration whose binding is checked once the whole input
/// has been seen, since the enclosing binding may come later in the source.
#[derive(Debug, Clone)]
struct PendingNonlocal {
    scope: ScopeId,
    name: String,
    span: Span,
}

pub(crate) struct Parser<'src, 'f, F: NodeFactory + ?Sized> {
    pub(super) lex: Lexer<'src>,
    pub(super) src: &'src str,
    source_chars: u32,
    pub(super) scopes: ScopeEnvironment,
    pub(super) loops: LoopTracker,
    pub(super) stacks: BuilderStacks<'src>,
    pub(super) factory: &'f mut F,
    /// Interactive input: running out of text mid-construct is reported as
    /// incomplete rather than as a syntax error.
    pub(super) interactive: bool,
    /// Set while parsing an f-string replacement field.
    pub(super) in_fragment: bool,
    /// End of the last consumed token that carries text.
    pub(super) prev_end: Offset,
    nesting: NestingDepth,
    nonlocals: Vec<PendingNonlocal>,
}

impl<'src, 'f, F: NodeFactory + ?Sized> Parser<'src, 'f, F> {
    pub(crate) fn new(
        src: &'src str,
        scopes: ScopeEnvironment,
        factory: &'f mut F,
        interactive: bool,
    ) -> Self {
        Self {
            lex: Lexer::new(src),
            src,
            source_chars: src.chars().count() as u32,
            scopes,
            loops: LoopTracker::default(),
            stacks: BuilderStacks::new(),
            factory,
            interactive,
            in_fragment: false,
            prev_end: 0,
            nesting: NestingDepth::default(),
            nonlocals: Vec::new(),
        }
    }

    pub(crate) fn into_scopes(self) -> ScopeEnvironment {
        debug_assert!(self.stacks.is_empty(), "values left on the builder stack");
        debug_assert!(!self.loops.in_loop(), "loop body left open");
        debug!(scopes = self.scopes.scopes().len(), "builder finished");
        self.scopes
    }

    // ── tokens ────────────────────────────────────────────────────────────────

    pub(super) fn peek(&mut self) -> Token<'src> {
        self.lex.peek()
    }

    pub(super) fn peek_kind(&mut self) -> TokenKind {
        self.lex.peek().kind
    }

    pub(super) fn at(&mut self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(super) fn bump(&mut self) -> Token<'src> {
        let tok = self.lex.bump();
        if !tok.text.is_empty()
            && !matches!(
                tok.kind,
                TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
            )
        {
            self.prev_end = tok.stop;
        }
        tok
    }

    pub(super) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, kind: TokenKind) -> ParseResult<Token<'src>> {
        let tok = self.peek();
        if tok.kind == kind {
            Ok(self.bump())
        } else {
            Err(self.unexpected(tok))
        }
    }

    pub(super) fn expect_name(&mut self) -> ParseResult<(&'src str, Token<'src>)> {
        let tok = self.expect(TokenKind::Name)?;
        Ok((tok.text, tok))
    }

    pub(super) fn expect_newline(&mut self) -> ParseResult<()> {
        self.expect(TokenKind::Newline).map(|_| ())
    }

    /// Whether the next token ends a simple statement.
    pub(super) fn at_statement_end(&mut self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
        )
    }

    pub(super) fn span_from(&self, start: Offset) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    // ── errors ────────────────────────────────────────────────────────────────

    pub(super) fn error_at(&self, span: Span, kind: ErrorKind, message: impl Into<String>) -> ParseError {
        ParseError::at_span(kind, message, span, self.src)
    }

    pub(super) fn error_at_token(
        &self,
        tok: &Token<'_>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> ParseError {
        ParseError::at_token(kind, message, tok)
    }

    /// Whether running into `tok` means interactive input simply stopped
    /// before a construct was finished.
    pub(super) fn is_incomplete_at(&self, tok: &Token<'_>) -> bool {
        if !self.interactive || self.in_fragment {
            return false;
        }
        match tok.kind {
            TokenKind::Eof | TokenKind::LineJoiningEofError => true,
            TokenKind::UnterminatedString => strings::is_triple_quoted(tok.text),
            TokenKind::Newline | TokenKind::Dedent => {
                tok.text.is_empty() && tok.start >= self.source_chars && self.lex.open_brackets() > 0
            }
            _ => false,
        }
    }

    /// The error for a token no production accepts. Lexical error tokens map
    /// to their own error kinds.
    pub(super) fn unexpected(&self, tok: Token<'_>) -> ParseError {
        use TokenKind as T;
        if self.is_incomplete_at(&tok) {
            return self.error_at_token(&tok, ErrorKind::Incomplete, "incomplete input");
        }
        let at_end = tok.text.is_empty() && tok.start >= self.source_chars;
        let (kind, message) = match tok.kind {
            T::IndentError => (
                ErrorKind::Indentation,
                "unindent does not match any outer indentation level".to_string(),
            ),
            T::TabError => (
                ErrorKind::Tab,
                "inconsistent use of tabs and spaces in indentation".to_string(),
            ),
            T::LineJoiningEofError => (
                ErrorKind::LineJoiningEof,
                "unexpected EOF while parsing".to_string(),
            ),
            T::UnterminatedString if strings::is_triple_quoted(tok.text) => (
                ErrorKind::UnterminatedString,
                "unterminated triple-quoted string literal".to_string(),
            ),
            T::UnterminatedString => (
                ErrorKind::UnterminatedString,
                "unterminated string literal".to_string(),
            ),
            T::ErrorToken if tok.text == "\\" => (
                ErrorKind::Tokenize,
                "unexpected character after line continuation character".to_string(),
            ),
            T::ErrorToken => (
                ErrorKind::Tokenize,
                format!("invalid character '{}'", tok.text),
            ),
            T::Indent => (ErrorKind::Indentation, "unexpected indent".to_string()),
            T::Eof | T::Newline | T::Dedent if at_end => (
                ErrorKind::Grammar,
                "unexpected EOF while parsing".to_string(),
            ),
            _ => (ErrorKind::Grammar, "invalid syntax".to_string()),
        };
        self.error_at_token(&tok, kind, message)
    }

    // ── guards ────────────────────────────────────────────────────────────────

    /// Run `f` with values pushed since entry collected into a vector. On
    /// error the partial values are discarded.
    pub(super) fn collect(
        &mut self,
        f: impl FnOnce(&mut Self) -> ParseResult<()>,
    ) -> ParseResult<Vec<Node>> {
        let mark = self.stacks.mark();
        match f(self) {
            Ok(()) => Ok(self.stacks.take_values(mark)),
            Err(err) => {
                self.stacks.reset(mark);
                Err(err)
            }
        }
    }

    /// Run `f` inside a new scope. The scope is popped even when `f` fails.
    pub(super) fn with_scope<T>(
        &mut self,
        name: &str,
        kind: ScopeKind,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<(ScopeId, T)> {
        let id = self.scopes.push_scope(name, kind);
        let result = f(self);
        self.scopes.pop_scope();
        result.map(|value| (id, value))
    }

    /// Run `f` with the parent of the current scope made current, as for a
    /// comprehension's first iterable or a parameter default.
    pub(super) fn in_enclosing_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let reentered = self.scopes.reenter_parent();
        let result = f(self);
        if reentered {
            self.scopes.pop_scope();
        }
        result
    }

    /// Run `f` with enclosing loops hidden (function, lambda and class
    /// bodies).
    pub(super) fn with_boundary<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        self.loops.enter_boundary();
        let result = f(self);
        self.loops.leave_boundary();
        result
    }

    /// Run `f` one level deeper in `nesting`. Input nested past the limit is
    /// rejected at `tok` before the recursion can exhaust the stack.
    pub(super) fn nested<T>(
        &mut self,
        tok: &Token<'_>,
        nesting: Nesting,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let (depth, limit) = self.nesting.counter(nesting);
        if *depth >= limit {
            debug!(?nesting, limit, line = tok.line, "nesting limit reached");
            let (kind, message) = match nesting {
                Nesting::Bracket => (ErrorKind::Grammar, "too many nested parentheses"),
                Nesting::Block => (ErrorKind::Indentation, "too many levels of indentation"),
                Nesting::Expression => (ErrorKind::Grammar, "expression too deeply nested"),
            };
            return Err(self.error_at_token(tok, kind, message));
        }
        *depth += 1;
        let result = f(self);
        *self.nesting.counter(nesting).0 -= 1;
        result
    }

    /// Parse a loop body suite under a fresh loop state.
    pub(super) fn loop_body(&mut self) -> ParseResult<(Vec<Node>, LoopFlags)> {
        self.loops.enter_loop();
        let body = self.parse_suite();
        let flags = self.loops.leave_loop();
        Ok((body?, flags))
    }

    // ── deferred checks ───────────────────────────────────────────────────────

    pub(super) fn defer_nonlocal(&mut self, name: &str, span: Span) {
        self.nonlocals.push(PendingNonlocal {
            scope: self.scopes.current(),
            name: name.to_string(),
            span,
        });
    }

    /// Every `nonlocal` name must be bound in an enclosing function scope.
    pub(crate) fn check_nonlocal_bindings(&self) -> ParseResult<()> {
        let scopes = self.scopes.scopes();
        for pending in &self.nonlocals {
            let mut cursor = scopes.get(pending.scope).parent;
            let mut found = false;
            while let Some(id) = cursor {
                let scope = scopes.get(id);
                if scope.kind == ScopeKind::Module {
                    break;
                }
                if scope.kind != ScopeKind::Class
                    && scope.declares(&pending.name)
                    && !scope.globals.contains(&pending.name)
                {
                    found = true;
                    break;
                }
                cursor = scope.parent;
            }
            if !found {
                return Err(self.error_at(
                    pending.span,
                    ErrorKind::Semantic,
                    format!("no binding for nonlocal '{}' found", pending.name),
                ));
            }
        }
        Ok(())
    }
}
