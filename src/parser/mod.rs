//! Python 3 front-end: tokenizer, scope environment and SST builder.
//!
//! Every entry point builds a fresh [`Lexer`](lexer::Lexer), builder state
//! and [`ScopeEnvironment`]; nothing is shared between parse calls, so
//! independent sources can be parsed concurrently.

pub mod args;
mod builder;
mod expr;
pub mod factory;
pub mod lexer;
pub mod loop_state;
pub mod numbers;
pub mod scope;
pub mod stacks;
mod stmt;
pub mod strings;
mod targets;

use std::{panic, thread};

use tracing::debug;

use crate::error::ParseResult;
use crate::sst::{Node, NodeKind, RootKind, Sst};
use builder::Parser;
use factory::{NodeFactory, SstFactory};
use lexer::TokenKind;
use scope::{LexicalFrame, ScopeEnvironment, ScopeKind};

pub use lexer::{Token, tokenize};

/// Which production a source is parsed as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMode {
    /// A whole file.
    Module,
    /// One statement. Interactive input additionally reports running out of
    /// text as [`crate::error::ErrorKind::Incomplete`] and displays
    /// expression values.
    Statement { interactive: bool },
    /// A module body compiled as a function whose parameters are the given
    /// names.
    WithArguments(Vec<String>),
    /// A single expression evaluated inside an existing lexical frame.
    Inline(LexicalFrame),
}

impl ParseMode {
    fn label(&self) -> &'static str {
        match self {
            ParseMode::Module => "module",
            ParseMode::Statement { interactive: false } => "statement",
            ParseMode::Statement { interactive: true } => "interactive",
            ParseMode::WithArguments(_) => "with-arguments",
            ParseMode::Inline(_) => "inline",
        }
    }
}

pub fn parse_module(source: &str) -> ParseResult<Sst> {
    parse(source, &ParseMode::Module)
}

pub fn parse_single_statement(source: &str, interactive: bool) -> ParseResult<Sst> {
    parse(source, &ParseMode::Statement { interactive })
}

/// Parse `source` as the body of a function taking `names`, so the names
/// resolve as parameters instead of globals.
pub fn parse_with_arguments(source: &str, names: &[String]) -> ParseResult<Sst> {
    parse(source, &ParseMode::WithArguments(names.to_vec()))
}

/// Parse one expression against the names bound in `frame`.
pub fn parse_inline(source: &str, frame: &LexicalFrame) -> ParseResult<Sst> {
    parse(source, &ParseMode::Inline(frame.clone()))
}

/// Stack reserved for the thread each [`parse`] runs on. The builder's
/// nesting limits keep the deepest accepted input well inside it.
const PARSE_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Parse `source` on a dedicated thread with [`PARSE_STACK_SIZE`] of stack,
/// so deeply nested input is limited by the builder rather than by the
/// caller's stack. Falls back to the calling thread if none can be spawned.
pub fn parse(source: &str, mode: &ParseMode) -> ParseResult<Sst> {
    let run = || {
        let mut factory = SstFactory;
        parse_with_factory(source, mode, &mut factory)
    };
    thread::scope(|s| {
        let worker = thread::Builder::new()
            .name("pyfront-parse".to_string())
            .stack_size(PARSE_STACK_SIZE)
            .spawn_scoped(s, run);
        match worker {
            Ok(handle) => handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)),
            Err(err) => {
                debug!(%err, "parse thread unavailable, parsing inline");
                run()
            }
        }
    })
}

/// Like [`parse`], but composite nodes are built by `factory` on the
/// calling thread, whose stack must fit the input's nesting.
pub fn parse_with_factory<F: NodeFactory + ?Sized>(
    source: &str,
    mode: &ParseMode,
    factory: &mut F,
) -> ParseResult<Sst> {
    debug!(mode = mode.label(), chars = source.chars().count(), "parse start");
    let mut env = ScopeEnvironment::new("<module>", ScopeKind::Module);
    let root_scope = match mode {
        ParseMode::WithArguments(names) => {
            let id = env.push_scope("<with-arguments>", ScopeKind::Function);
            for name in names {
                env.create_param(name);
            }
            id
        }
        ParseMode::Inline(frame) => env.push_captured("<inline>", ScopeKind::Function, frame),
        _ => env.root(),
    };
    let interactive = matches!(mode, ParseMode::Statement { interactive: true });

    let mut parser = Parser::new(source, env, factory, interactive);
    let (kind, root) = match mode {
        ParseMode::Module => {
            let body = parser.collect(|p| p.parse_file_input())?;
            let span = parser.span_from(0);
            (RootKind::Module, Node::new(NodeKind::Module { body }, span))
        }
        ParseMode::Statement { .. } => {
            let body = parser.collect(|p| p.parse_single_input())?;
            let span = parser.span_from(0);
            (RootKind::Statement, Node::new(NodeKind::Interactive { body }, span))
        }
        ParseMode::WithArguments(names) => {
            let body = parser.collect(|p| p.parse_file_input())?;
            let span = parser.span_from(0);
            let node = NodeKind::FunctionBody {
                params: names.clone(),
                body,
                scope: root_scope,
            };
            (RootKind::WithArguments, Node::new(node, span))
        }
        ParseMode::Inline(_) => {
            let value = parser.parse_inline_expression()?;
            let span = value.span();
            // Free names are filled in once the scope arena is complete.
            let node = NodeKind::InlineExpression {
                value: value.boxed(),
                frame_locals: Vec::new(),
            };
            (RootKind::Inline, Node::new(node, span))
        }
    };
    parser.check_nonlocal_bindings()?;

    let scopes = parser.into_scopes().into_scopes();
    let mut root = root;
    if let NodeKind::InlineExpression { frame_locals, .. } = &mut root.kind {
        *frame_locals = scopes.free_names_resolving_to(root_scope);
    }
    debug!(mode = mode.label(), scopes = scopes.len(), "parse done");
    Ok(Sst {
        kind,
        root,
        root_scope,
        scopes,
    })
}

impl<F: NodeFactory + ?Sized> Parser<'_, '_, F> {
    /// `eval_input`: a testlist followed by optional newlines and EOF.
    fn parse_inline_expression(&mut self) -> ParseResult<Node> {
        while self.eat(TokenKind::Newline) {}
        let value = self.parse_testlist()?;
        while self.eat(TokenKind::Newline) {}
        let tok = self.peek();
        if tok.kind != TokenKind::Eof {
            return Err(self.unexpected(tok));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ParseError};
    use crate::sst::{BinOp, CmpOp, Literal, Number};

    fn body(src: &str) -> Vec<Node> {
        let sst = parse_module(src).unwrap();
        match sst.root.kind {
            NodeKind::Module { body } => body,
            other => panic!("expected module, got {other:?}"),
        }
    }

    fn expr(src: &str) -> NodeKind {
        let mut stmts = body(src);
        assert_eq!(stmts.len(), 1, "expected one statement in {src:?}");
        match stmts.remove(0).kind {
            NodeKind::Expr(value) => value.kind,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    fn err(src: &str) -> ParseError {
        parse_module(src).unwrap_err()
    }

    #[test]
    fn test_empty_module() {
        assert!(body("").is_empty());
        assert!(body("\n\n# comment\n").is_empty());
    }

    #[test]
    fn test_precedence() {
        let NodeKind::BinOp { op, left, right } = expr("1 + 2 * 3") else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOp::Add);
        assert!(left.is_number());
        assert!(matches!(right.kind, NodeKind::BinOp { op: BinOp::Mult, .. }));
    }

    #[test]
    fn test_power_is_right_associative() {
        let NodeKind::BinOp { op, right, .. } = expr("2 ** 3 ** 2") else {
            panic!("expected binop");
        };
        assert_eq!(op, BinOp::Pow);
        assert!(matches!(right.kind, NodeKind::BinOp { op: BinOp::Pow, .. }));
    }

    #[test]
    fn test_negative_literal_folds() {
        assert_eq!(expr("-5"), NodeKind::Literal(Literal::Number(Number::Int(-5))));
        assert!(matches!(expr("-x"), NodeKind::UnaryOp { .. }));
    }

    #[test]
    fn test_is_not_and_not_in() {
        let NodeKind::Compare { ops, .. } = expr("a is not b not in c") else {
            panic!("expected compare");
        };
        assert_eq!(ops, vec![CmpOp::IsNot, CmpOp::NotIn]);
    }

    #[test]
    fn test_attribute_call_subscript_chain() {
        let NodeKind::Subscript { value, slice } = expr("a.b(1, k=2)[1:2]") else {
            panic!("expected subscript");
        };
        assert!(matches!(slice.kind, NodeKind::Slice { .. }));
        let NodeKind::Call { func, args, keywords } = value.kind else {
            panic!("expected call");
        };
        assert!(matches!(func.kind, NodeKind::Attribute { .. }));
        assert_eq!(args.len(), 1);
        assert_eq!(keywords[0].arg.as_deref(), Some("k"));
    }

    #[test]
    fn test_node_spans_are_char_offsets() {
        let stmts = body("s = 'é'\nx = 1\n");
        assert_eq!((stmts[0].start, stmts[0].end), (0, 7));
        assert_eq!((stmts[1].start, stmts[1].end), (8, 13));
    }

    #[test]
    fn test_multiple_statements_rejected_in_single_mode() {
        let e = parse_single_statement("x = 1\ny = 2\n", false).unwrap_err();
        assert_eq!(e.kind, ErrorKind::Grammar);
        assert!(e.message.contains("multiple statements"));
        assert!(parse_single_statement("x = 1; y = 2\n", false).is_ok());
    }

    #[test]
    fn test_interactive_expression_is_displayed() {
        let sst = parse_single_statement("1 + 1\n", true).unwrap();
        let NodeKind::Interactive { body } = sst.root.kind else {
            panic!("expected interactive root");
        };
        assert!(matches!(body[0].kind, NodeKind::PrintExpr(_)));
    }

    #[test]
    fn test_interactive_open_block_is_incomplete() {
        let e = parse_single_statement("if x:\n", true).unwrap_err();
        assert!(e.is_incomplete());
        let e = parse_single_statement("if x:\n", false).unwrap_err();
        assert!(!e.is_incomplete());
    }

    #[test]
    fn test_with_arguments_binds_params() {
        let names = vec!["a".to_string(), "b".to_string()];
        let sst = parse_with_arguments("return a + b\n", &names).unwrap();
        let scope = sst.scopes.get(sst.root_scope);
        assert_eq!(scope.params, names);
        assert!(matches!(sst.root.kind, NodeKind::FunctionBody { .. }));
    }

    #[test]
    fn test_inline_frame_locals() {
        let frame = LexicalFrame::new(["x", "y"]);
        let sst = parse_inline("x + len(z)", &frame).unwrap();
        let NodeKind::InlineExpression { frame_locals, .. } = sst.root.kind else {
            panic!("expected inline root");
        };
        assert_eq!(frame_locals, vec!["x".to_string()]);
    }

    #[test]
    fn test_return_outside_function() {
        let e = err("return 1\n");
        assert_eq!(e.message, "'return' outside function");
    }

    #[test]
    fn test_nonlocal_needs_binding() {
        assert!(parse_module("def f():\n    x = 1\n    def g():\n        nonlocal x\n").is_ok());
        let e = err("def f():\n    def g():\n        nonlocal x\n");
        assert_eq!(e.message, "no binding for nonlocal 'x' found");
        let e = err("nonlocal x\n");
        assert_eq!(e.message, "nonlocal declaration not allowed at module level");
    }
}
