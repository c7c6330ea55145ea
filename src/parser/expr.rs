//! Expression productions: the precedence chain from `test` down to atoms,
//! displays and comprehensions, call arguments, subscripts and string runs.

use crate::error::{ErrorKind, ParseResult};
use crate::parser::args::ArgListBuilder;
use crate::parser::builder::{Nesting, Parser};
use crate::parser::factory::{NodeFactory, Segment, StringPiece};
use crate::parser::lexer::{Lexer, Origin, TokenKind as T};
use crate::parser::numbers;
use crate::parser::scope::{EnvMark, ScopeKind};
use crate::parser::stacks::StrPiece;
use crate::parser::strings::{self, FSegment};
use crate::parser::targets::TargetContext;
use crate::sst::{
    BinOp, BoolOpKind, CmpOp, CompFor, Comprehension, ComprehensionKind, Keyword, Literal, Node,
    NodeKind, Offset, Span, UnaryOp,
};

type Production<P> = fn(&mut P) -> ParseResult<Node>;

/// Tokens that can begin an expression.
pub(super) fn starts_expression(kind: T) -> bool {
    matches!(
        kind,
        T::Name
            | T::DecimalInteger
            | T::OctInteger
            | T::HexInteger
            | T::BinInteger
            | T::Float
            | T::Imaginary
            | T::String
            | T::LParen
            | T::LBracket
            | T::LBrace
            | T::Minus
            | T::Plus
            | T::Tilde
            | T::KwNot
            | T::KwLambda
            | T::KwAwait
            | T::KwNone
            | T::KwTrue
            | T::KwFalse
            | T::Ellipsis
            | T::Star
    )
}

fn starts_subscript(kind: T) -> bool {
    starts_expression(kind) || kind == T::Colon
}

fn comprehension_scope(kind: ComprehensionKind) -> (&'static str, ScopeKind) {
    match kind {
        ComprehensionKind::List => ("<listcomp>", ScopeKind::ListComp),
        ComprehensionKind::Set => ("<setcomp>", ScopeKind::SetComp),
        ComprehensionKind::Dict => ("<dictcomp>", ScopeKind::DictComp),
        ComprehensionKind::Generator => ("<genexpr>", ScopeKind::GenExp),
    }
}

fn describe_scope(kind: ScopeKind) -> &'static str {
    match kind {
        ScopeKind::ListComp => "list comprehension",
        ScopeKind::SetComp => "set comprehension",
        ScopeKind::DictComp => "dict comprehension",
        _ => "generator expression",
    }
}

fn term_op(kind: T) -> Option<BinOp> {
    match kind {
        T::Star => Some(BinOp::Mult),
        T::At => Some(BinOp::MatMult),
        T::Slash => Some(BinOp::Div),
        T::DoubleSlash => Some(BinOp::FloorDiv),
        T::Percent => Some(BinOp::Mod),
        _ => None,
    }
}

fn arith_op(kind: T) -> Option<BinOp> {
    match kind {
        T::Plus => Some(BinOp::Add),
        T::Minus => Some(BinOp::Sub),
        _ => None,
    }
}

fn shift_op(kind: T) -> Option<BinOp> {
    match kind {
        T::LeftShift => Some(BinOp::LShift),
        T::RightShift => Some(BinOp::RShift),
        _ => None,
    }
}

fn and_op(kind: T) -> Option<BinOp> {
    (kind == T::Amper).then_some(BinOp::BitAnd)
}

fn xor_op(kind: T) -> Option<BinOp> {
    (kind == T::Caret).then_some(BinOp::BitXor)
}

fn or_op(kind: T) -> Option<BinOp> {
    (kind == T::Pipe).then_some(BinOp::BitOr)
}

impl<'src, F: NodeFactory + ?Sized> Parser<'src, '_, F> {
    // ── Lists of expressions ──────────────────────────────────────────────────

    /// Comma-separated `item`s with an optional trailing comma. Returns the
    /// items and whether a comma was seen (i.e. the result is a tuple).
    fn parse_sequence(
        &mut self,
        item: Production<Self>,
        continues: fn(T) -> bool,
    ) -> ParseResult<(Vec<Node>, bool)> {
        let mut is_tuple = false;
        let items = self.collect(|p| {
            loop {
                let node = item(p)?;
                p.stacks.push_value(node);
                if !p.eat(T::Comma) {
                    return Ok(());
                }
                is_tuple = true;
                if !continues(p.peek_kind()) {
                    return Ok(());
                }
            }
        })?;
        Ok((items, is_tuple))
    }

    fn tuple_or_single(&mut self, start: Offset, mut items: Vec<Node>, is_tuple: bool) -> Node {
        if !is_tuple && items.len() == 1 {
            if let Some(only) = items.pop() {
                return only;
            }
        }
        Node::new(NodeKind::Tuple(items), self.span_from(start))
    }

    pub(super) fn parse_testlist(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let (items, is_tuple) = self.parse_sequence(Self::parse_test, starts_expression)?;
        Ok(self.tuple_or_single(start, items, is_tuple))
    }

    pub(super) fn parse_testlist_star_expr(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let (items, is_tuple) = self.parse_sequence(Self::parse_test_or_star, starts_expression)?;
        Ok(self.tuple_or_single(start, items, is_tuple))
    }

    /// `exprlist` split into its elements: `a, b` gives two items, `a`
    /// gives one.
    pub(super) fn parse_exprlist_items(&mut self) -> ParseResult<(Vec<Node>, bool)> {
        self.parse_sequence(Self::parse_expr_or_star, starts_expression)
    }

    pub(super) fn parse_exprlist(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let (items, is_tuple) = self.parse_exprlist_items()?;
        Ok(self.tuple_or_single(start, items, is_tuple))
    }

    fn parse_star_expr(&mut self) -> ParseResult<Node> {
        let tok = self.expect(T::Star)?;
        let value = self.parse_expr()?;
        Ok(Node::new(NodeKind::Starred(value.boxed()), self.span_from(tok.start)))
    }

    fn parse_test_or_star(&mut self) -> ParseResult<Node> {
        if self.at(T::Star) {
            self.parse_star_expr()
        } else {
            self.parse_test()
        }
    }

    fn parse_expr_or_star(&mut self) -> ParseResult<Node> {
        if self.at(T::Star) {
            self.parse_star_expr()
        } else {
            self.parse_expr()
        }
    }

    fn parse_namedexpr_or_star(&mut self) -> ParseResult<Node> {
        if self.at(T::Star) {
            self.parse_star_expr()
        } else {
            self.parse_namedexpr_test()
        }
    }

    // ── test / lambda / boolean operators ─────────────────────────────────────

    /// `test [':=' test]`
    pub(super) fn parse_namedexpr_test(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let target = self.parse_test()?;
        if !self.at(T::Walrus) {
            return Ok(target);
        }
        self.finish_named_expr(start, target)
    }

    fn finish_named_expr(&mut self, start: Offset, target: Node) -> ParseResult<Node> {
        self.bump();
        let NodeKind::Name(name) = &target.kind else {
            return Err(self.error_at(
                target.span(),
                ErrorKind::Semantic,
                format!("cannot use assignment expressions with {}", target.describe()),
            ));
        };
        self.scopes.create_walrus_local(name);
        let value = self.parse_test()?;
        Ok(Node::new(
            NodeKind::NamedExpr {
                target: target.boxed(),
                value: value.boxed(),
            },
            self.span_from(start),
        ))
    }

    pub(super) fn parse_test(&mut self) -> ParseResult<Node> {
        if self.at(T::KwLambda) {
            return self.parse_lambda(false);
        }
        let start = self.peek().start;
        let body = self.parse_or_test()?;
        if !self.eat(T::KwIf) {
            return Ok(body);
        }
        let test = self.parse_or_test()?;
        let kw = self.expect(T::KwElse)?;
        let orelse = self.nested(&kw, Nesting::Expression, Self::parse_test)?;
        Ok(Node::new(
            NodeKind::IfExp {
                test: test.boxed(),
                body: body.boxed(),
                orelse: orelse.boxed(),
            },
            self.span_from(start),
        ))
    }

    /// `test_nocond`: no conditional expression, used after `if` in
    /// comprehensions.
    fn parse_test_nocond(&mut self) -> ParseResult<Node> {
        if self.at(T::KwLambda) {
            self.parse_lambda(true)
        } else {
            self.parse_or_test()
        }
    }

    fn parse_lambda(&mut self, nocond: bool) -> ParseResult<Node> {
        let tok = self.bump();
        let (scope, (params, body)) = self.with_scope("<lambda>", ScopeKind::Lambda, |p| {
            let params = p.parse_parameters(T::Colon, false)?;
            p.expect(T::Colon)?;
            let body = p.nested(&tok, Nesting::Expression, |p| {
                p.with_boundary(|p| {
                    if nocond {
                        p.parse_test_nocond()
                    } else {
                        p.parse_test()
                    }
                })
            })?;
            Ok((params, body))
        })?;
        Ok(Node::new(
            NodeKind::Lambda {
                params: Box::new(params),
                body: body.boxed(),
                scope,
            },
            self.span_from(tok.start),
        ))
    }

    fn parse_bool_level(
        &mut self,
        next: Production<Self>,
        keyword: T,
        op: BoolOpKind,
    ) -> ParseResult<Node> {
        let start = self.peek().start;
        let mut left = next(self)?;
        while self.eat(keyword) {
            let right = next(self)?;
            left = Node::new(
                NodeKind::BoolOp {
                    op,
                    left: left.boxed(),
                    right: right.boxed(),
                },
                self.span_from(start),
            );
        }
        Ok(left)
    }

    fn parse_or_test(&mut self) -> ParseResult<Node> {
        self.parse_bool_level(Self::parse_and_test, T::KwOr, BoolOpKind::Or)
    }

    fn parse_and_test(&mut self) -> ParseResult<Node> {
        self.parse_bool_level(Self::parse_not_test, T::KwAnd, BoolOpKind::And)
    }

    fn parse_not_test(&mut self) -> ParseResult<Node> {
        if !self.at(T::KwNot) {
            return self.parse_comparison();
        }
        let tok = self.bump();
        let operand = self.nested(&tok, Nesting::Expression, Self::parse_not_test)?;
        Ok(Node::new(
            NodeKind::UnaryOp {
                op: UnaryOp::Not,
                operand: operand.boxed(),
            },
            self.span_from(tok.start),
        ))
    }

    // ── comparisons ───────────────────────────────────────────────────────────

    fn eat_cmp_op(&mut self) -> ParseResult<Option<CmpOp>> {
        let op = match self.peek_kind() {
            T::Less => CmpOp::Lt,
            T::Greater => CmpOp::Gt,
            T::LessEqual => CmpOp::LtE,
            T::GreaterEqual => CmpOp::GtE,
            T::EqEqual => CmpOp::Eq,
            T::NotEqual => CmpOp::NotEq,
            T::KwIn => CmpOp::In,
            T::KwIs => {
                self.bump();
                return Ok(Some(if self.eat(T::KwNot) {
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }));
            }
            T::KwNot => {
                self.bump();
                self.expect(T::KwIn)?;
                return Ok(Some(CmpOp::NotIn));
            }
            _ => return Ok(None),
        };
        self.bump();
        Ok(Some(op))
    }

    /// A comparison chain becomes one node: `a < b <= c` holds operands
    /// `[a, b, c]` and operators `[<, <=]`.
    fn parse_comparison(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let first = self.parse_expr()?;
        let Some(op) = self.eat_cmp_op()? else {
            return Ok(first);
        };
        let mut ops = vec![op];
        let operands = self.collect(|p| {
            p.stacks.push_value(first);
            loop {
                let next = p.parse_expr()?;
                p.stacks.push_value(next);
                match p.eat_cmp_op()? {
                    Some(op) => ops.push(op),
                    None => return Ok(()),
                }
            }
        })?;
        Ok(Node::new(
            NodeKind::Compare { operands, ops },
            self.span_from(start),
        ))
    }

    // ── binary operators ──────────────────────────────────────────────────────

    fn parse_binary_level(
        &mut self,
        next: Production<Self>,
        op_of: fn(T) -> Option<BinOp>,
    ) -> ParseResult<Node> {
        let start = self.peek().start;
        let mut left = next(self)?;
        while let Some(op) = op_of(self.peek_kind()) {
            self.bump();
            let right = next(self)?;
            left = Node::new(
                NodeKind::BinOp {
                    op,
                    left: left.boxed(),
                    right: right.boxed(),
                },
                self.span_from(start),
            );
        }
        Ok(left)
    }

    /// `expr`: bitwise or and everything tighter.
    pub(super) fn parse_expr(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Self::parse_xor_expr, or_op)
    }

    fn parse_xor_expr(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Self::parse_and_expr, xor_op)
    }

    fn parse_and_expr(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Self::parse_shift_expr, and_op)
    }

    fn parse_shift_expr(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Self::parse_arith_expr, shift_op)
    }

    fn parse_arith_expr(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Self::parse_term, arith_op)
    }

    fn parse_term(&mut self) -> ParseResult<Node> {
        self.parse_binary_level(Self::parse_factor, term_op)
    }

    /// Unary `+`, `-`, `~`. Negating a numeric literal folds into the
    /// literal, so `--2` is the literal `2`.
    fn parse_factor(&mut self) -> ParseResult<Node> {
        let op = match self.peek_kind() {
            T::Plus => UnaryOp::UAdd,
            T::Minus => UnaryOp::USub,
            T::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        let tok = self.bump();
        let operand = self.nested(&tok, Nesting::Expression, Self::parse_factor)?;
        let span = self.span_from(tok.start);
        match operand.kind {
            NodeKind::Literal(Literal::Number(n)) if op == UnaryOp::USub => Ok(Node::new(
                NodeKind::Literal(Literal::Number(n.negate())),
                span,
            )),
            kind => Ok(Node::new(
                NodeKind::UnaryOp {
                    op,
                    operand: Node::new(kind, Span::new(operand.start, operand.end)).boxed(),
                },
                span,
            )),
        }
    }

    fn parse_power(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let base = self.parse_atom_expr()?;
        if !self.at(T::DoubleStar) {
            return Ok(base);
        }
        let op = self.bump();
        let exponent = self.nested(&op, Nesting::Expression, Self::parse_factor)?;
        Ok(Node::new(
            NodeKind::BinOp {
                op: BinOp::Pow,
                left: base.boxed(),
                right: exponent.boxed(),
            },
            self.span_from(start),
        ))
    }

    // ── trailers ──────────────────────────────────────────────────────────────

    fn parse_atom_expr(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let awaited = self.eat(T::KwAwait);
        let mut node = self.parse_atom()?;
        loop {
            match self.peek_kind() {
                T::LParen => {
                    let open = self.bump();
                    let (args, keywords) =
                        self.nested(&open, Nesting::Bracket, |p| p.parse_arglist(T::RParen))?;
                    self.expect(T::RParen)?;
                    node = Node::new(
                        NodeKind::Call {
                            func: node.boxed(),
                            args,
                            keywords,
                        },
                        self.span_from(start),
                    );
                }
                T::LBracket => {
                    let open = self.bump();
                    let slice = self.nested(&open, Nesting::Bracket, Self::parse_subscriptlist)?;
                    self.expect(T::RBracket)?;
                    node = Node::new(
                        NodeKind::Subscript {
                            value: node.boxed(),
                            slice: slice.boxed(),
                        },
                        self.span_from(start),
                    );
                }
                T::Dot => {
                    self.bump();
                    let (attr, _) = self.expect_name()?;
                    node = Node::new(
                        NodeKind::Attribute {
                            value: node.boxed(),
                            attr: attr.to_string(),
                        },
                        self.span_from(start),
                    );
                }
                _ => break,
            }
        }
        if awaited {
            node = Node::new(NodeKind::Await(node.boxed()), self.span_from(start));
        }
        Ok(node)
    }

    fn parse_subscriptlist(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let (items, is_tuple) = self.parse_sequence(Self::parse_subscript, starts_subscript)?;
        Ok(self.tuple_or_single(start, items, is_tuple))
    }

    fn parse_subscript(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let mut lower = None;
        if !self.at(T::Colon) {
            let value = self.parse_test()?;
            if !self.at(T::Colon) {
                return Ok(value);
            }
            lower = Some(value.boxed());
        }
        self.bump();
        let upper = if starts_expression(self.peek_kind()) {
            Some(self.parse_test()?.boxed())
        } else {
            None
        };
        let step = if self.eat(T::Colon) && starts_expression(self.peek_kind()) {
            Some(self.parse_test()?.boxed())
        } else {
            None
        };
        Ok(Node::new(
            NodeKind::Slice { lower, upper, step },
            self.span_from(start),
        ))
    }

    /// Call arguments up to (not including) `close`.
    pub(super) fn parse_arglist(&mut self, close: T) -> ParseResult<(Vec<Node>, Vec<Keyword>)> {
        let mut builder = ArgListBuilder::new();
        while !self.at(close) {
            let start = self.peek().start;
            let added = match self.peek_kind() {
                T::Star => {
                    let starred = self.parse_star_expr_test()?;
                    builder.add_starred(starred)
                }
                T::DoubleStar => {
                    self.bump();
                    let value = self.parse_test()?;
                    builder.add_kwargs(Keyword {
                        arg: None,
                        value,
                        start,
                        end: self.prev_end,
                    });
                    Ok(())
                }
                _ => {
                    let mark = self.scopes.mark();
                    let value = self.parse_test()?;
                    match self.peek_kind() {
                        T::Assign => {
                            let name = match value.kind {
                                NodeKind::Name(name) => name,
                                _ => {
                                    return Err(self.error_at(
                                        Span::new(value.start, value.end),
                                        ErrorKind::Semantic,
                                        "keyword can't be an expression",
                                    ));
                                }
                            };
                            self.scopes.discard_seen_since(mark);
                            self.bump();
                            let value = self.parse_test()?;
                            builder.add_keyword(Keyword {
                                arg: Some(name),
                                value,
                                start,
                                end: self.prev_end,
                            })
                        }
                        T::Walrus => {
                            let named = self.finish_named_expr(start, value)?;
                            builder.add_positional(named)
                        }
                        T::KwFor | T::KwAsync => {
                            let genexp = self.parse_comprehension(
                                ComprehensionKind::Generator,
                                value,
                                None,
                                start,
                                mark,
                            )?;
                            builder.add_naked_generator(genexp)
                        }
                        _ => builder.add_positional(value),
                    }
                }
            };
            added.map_err(|message| {
                self.error_at(self.span_from(start), ErrorKind::Semantic, message)
            })?;
            if !self.eat(T::Comma) {
                break;
            }
        }
        let end = self.peek();
        builder
            .finish()
            .map_err(|message| self.error_at_token(&end, ErrorKind::Semantic, message))
    }

    /// `'*' test`, as in a call argument.
    fn parse_star_expr_test(&mut self) -> ParseResult<Node> {
        let tok = self.expect(T::Star)?;
        let value = self.parse_test()?;
        Ok(Node::new(NodeKind::Starred(value.boxed()), self.span_from(tok.start)))
    }

    // ── yield ─────────────────────────────────────────────────────────────────

    pub(super) fn parse_yield_expr(&mut self) -> ParseResult<Node> {
        let tok = self.expect(T::KwYield)?;
        let kind = self.scopes.current_scope().kind;
        if kind.is_comprehension() {
            return Err(self.error_at_token(
                &tok,
                ErrorKind::Semantic,
                format!("'yield' inside {}", describe_scope(kind)),
            ));
        }
        if !kind.is_function() {
            return Err(self.error_at_token(&tok, ErrorKind::Semantic, "'yield' outside function"));
        }
        self.scopes.mark_generator();
        if self.eat(T::KwFrom) {
            let value = self.parse_test()?;
            return Ok(Node::new(
                NodeKind::YieldFrom(value.boxed()),
                self.span_from(tok.start),
            ));
        }
        let value = if starts_expression(self.peek_kind()) {
            Some(self.parse_testlist_star_expr()?.boxed())
        } else {
            None
        };
        Ok(Node::new(NodeKind::Yield(value), self.span_from(tok.start)))
    }

    // ── atoms ─────────────────────────────────────────────────────────────────

    fn parse_atom(&mut self) -> ParseResult<Node> {
        let tok = self.peek();
        match tok.kind {
            T::Name => {
                self.bump();
                self.scopes.add_seen_var(tok.text);
                Ok(Node::new(
                    NodeKind::Name(tok.text.to_string()),
                    self.span_from(tok.start),
                ))
            }
            kind if kind.is_number() => {
                self.bump();
                let number = numbers::parse_number(kind, tok.text)
                    .map_err(|message| self.error_at_token(&tok, ErrorKind::Tokenize, message))?;
                Ok(Node::new(
                    NodeKind::Literal(Literal::Number(number)),
                    self.span_from(tok.start),
                ))
            }
            T::String => self.parse_strings(),
            T::KwNone | T::KwTrue | T::KwFalse | T::Ellipsis => {
                self.bump();
                let value = match tok.kind {
                    T::KwNone => Literal::None,
                    T::KwTrue => Literal::Bool(true),
                    T::KwFalse => Literal::Bool(false),
                    _ => Literal::Ellipsis,
                };
                Ok(Node::new(NodeKind::Literal(value), self.span_from(tok.start)))
            }
            T::LParen => self.nested(&tok, Nesting::Bracket, Self::parse_paren_atom),
            T::LBracket => self.nested(&tok, Nesting::Bracket, Self::parse_list_atom),
            T::LBrace => self.nested(&tok, Nesting::Bracket, Self::parse_brace_atom),
            _ => Err(self.unexpected(tok)),
        }
    }

    /// `()`, `(x)`, `(x,)`, `(yield)`, `(x for x in y)`.
    fn parse_paren_atom(&mut self) -> ParseResult<Node> {
        let open = self.bump();
        if self.eat(T::RParen) {
            return Ok(Node::new(NodeKind::Tuple(Vec::new()), self.span_from(open.start)));
        }
        if self.at(T::KwYield) {
            let value = self.parse_yield_expr()?;
            self.expect(T::RParen)?;
            return Ok(value);
        }
        let mark = self.scopes.mark();
        let first = self.parse_namedexpr_or_star()?;
        if matches!(self.peek_kind(), T::KwFor | T::KwAsync) {
            let genexp = self.parse_comprehension(
                ComprehensionKind::Generator,
                first,
                None,
                open.start,
                mark,
            )?;
            self.expect(T::RParen)?;
            return Ok(self.respan(genexp, open.start));
        }
        if !self.at(T::Comma) {
            self.expect(T::RParen)?;
            if matches!(first.kind, NodeKind::Starred(_)) {
                return Err(self.error_at(
                    first.span(),
                    ErrorKind::Semantic,
                    "can't use starred expression here",
                ));
            }
            return Ok(first);
        }
        let items = self.rest_of_display(first, T::RParen)?;
        Ok(Node::new(NodeKind::Tuple(items), self.span_from(open.start)))
    }

    fn parse_list_atom(&mut self) -> ParseResult<Node> {
        let open = self.bump();
        if self.eat(T::RBracket) {
            return Ok(Node::new(NodeKind::List(Vec::new()), self.span_from(open.start)));
        }
        let mark = self.scopes.mark();
        let first = self.parse_namedexpr_or_star()?;
        if matches!(self.peek_kind(), T::KwFor | T::KwAsync) {
            let comp =
                self.parse_comprehension(ComprehensionKind::List, first, None, open.start, mark)?;
            self.expect(T::RBracket)?;
            return Ok(self.respan(comp, open.start));
        }
        let items = self.rest_of_display(first, T::RBracket)?;
        Ok(Node::new(NodeKind::List(items), self.span_from(open.start)))
    }

    /// Items after the first of a tuple, list or set display, through the
    /// closing bracket.
    fn rest_of_display(&mut self, first: Node, close: T) -> ParseResult<Vec<Node>> {
        let items = self.collect(|p| {
            p.stacks.push_value(first);
            while p.eat(T::Comma) {
                if p.at(close) {
                    break;
                }
                let item = p.parse_namedexpr_or_star()?;
                p.stacks.push_value(item);
            }
            Ok(())
        })?;
        self.expect(close)?;
        Ok(items)
    }

    fn parse_brace_atom(&mut self) -> ParseResult<Node> {
        let open = self.bump();
        if self.eat(T::RBrace) {
            return Ok(Node::new(
                NodeKind::Dict {
                    keys: Vec::new(),
                    values: Vec::new(),
                },
                self.span_from(open.start),
            ));
        }
        let mark = self.scopes.mark();
        if self.at(T::DoubleStar) {
            return self.rest_of_dict(open.start, None, mark);
        }
        let first = self.parse_test_or_star()?;
        if self.at(T::Colon) {
            if matches!(first.kind, NodeKind::Starred(_)) {
                let tok = self.peek();
                return Err(self.unexpected(tok));
            }
            return self.rest_of_dict(open.start, Some(first), mark);
        }
        if matches!(self.peek_kind(), T::KwFor | T::KwAsync) {
            let comp =
                self.parse_comprehension(ComprehensionKind::Set, first, None, open.start, mark)?;
            self.expect(T::RBrace)?;
            return Ok(self.respan(comp, open.start));
        }
        let items = self.collect(|p| {
            p.stacks.push_value(first);
            while p.eat(T::Comma) {
                if p.at(T::RBrace) {
                    break;
                }
                let item = p.parse_test_or_star()?;
                p.stacks.push_value(item);
            }
            Ok(())
        })?;
        self.expect(T::RBrace)?;
        Ok(Node::new(NodeKind::Set(items), self.span_from(open.start)))
    }

    /// A dict display or comprehension whose first key (or `None` for a
    /// leading `**` entry) has been parsed; the next token is `:` or `**`.
    fn rest_of_dict(
        &mut self,
        start: Offset,
        first_key: Option<Node>,
        mark: EnvMark,
    ) -> ParseResult<Node> {
        let first_value = self.parse_dict_value(first_key.is_some())?;
        let first_key = match first_key {
            Some(key) if matches!(self.peek_kind(), T::KwFor | T::KwAsync) => {
                let comp = self.parse_comprehension(
                    ComprehensionKind::Dict,
                    key,
                    Some(first_value),
                    start,
                    mark,
                )?;
                self.expect(T::RBrace)?;
                return Ok(self.respan(comp, start));
            }
            other => other,
        };
        let mut keys = vec![first_key];
        let mut values = vec![first_value];
        while self.eat(T::Comma) {
            if self.at(T::RBrace) {
                break;
            }
            if self.at(T::DoubleStar) {
                keys.push(None);
                values.push(self.parse_dict_value(false)?);
            } else {
                let key = self.parse_test()?;
                keys.push(Some(key));
                values.push(self.parse_dict_value(true)?);
            }
        }
        self.expect(T::RBrace)?;
        Ok(Node::new(NodeKind::Dict { keys, values }, self.span_from(start)))
    }

    /// `':' test` after a key, or `'**' expr` for an unpacked entry.
    fn parse_dict_value(&mut self, keyed: bool) -> ParseResult<Node> {
        if keyed {
            self.expect(T::Colon)?;
            self.parse_test()
        } else {
            self.expect(T::DoubleStar)?;
            self.parse_expr()
        }
    }

    fn respan(&self, mut node: Node, start: Offset) -> Node {
        let span = self.span_from(start);
        node.start = span.start;
        node.end = span.end;
        node
    }

    // ── comprehensions ────────────────────────────────────────────────────────

    /// Parse the `for`/`if` clauses of a comprehension whose element (and
    /// value, for dicts) has already been parsed. Reads recorded since
    /// `mark` belong to the new scope, not the enclosing one.
    fn parse_comprehension(
        &mut self,
        kind: ComprehensionKind,
        element: Node,
        value: Option<Node>,
        start: Offset,
        mark: EnvMark,
    ) -> ParseResult<Node> {
        if matches!(element.kind, NodeKind::Starred(_)) {
            return Err(self.error_at(
                element.span(),
                ErrorKind::Semantic,
                "iterable unpacking cannot be used in comprehension",
            ));
        }
        let enclosing = self.scopes.current();
        let (name, scope_kind) = comprehension_scope(kind);
        let (scope, generators) = self.with_scope(name, scope_kind, |p| {
            let inner = p.scopes.current();
            p.scopes.relocate_since(mark, enclosing, inner);
            p.parse_comp_clauses()
        })?;
        if self.scopes.walrus_in_class_since(mark) {
            return Err(self.error_at(
                self.span_from(start),
                ErrorKind::Semantic,
                "assignment expression within a comprehension cannot be used in a class body",
            ));
        }
        let comprehension = Comprehension {
            kind,
            element,
            value,
            generators,
            scope,
        };
        let span = self.span_from(start);
        Ok(self.factory.comprehension(comprehension, span))
    }

    fn parse_comp_clauses(&mut self) -> ParseResult<Vec<CompFor>> {
        let mut generators = Vec::new();
        loop {
            let is_async = self.eat(T::KwAsync);
            self.expect(T::KwFor)?;
            let target = self.parse_exprlist()?;
            self.check_store_target(&target, TargetContext::Comprehension)?;
            self.expect(T::KwIn)?;
            let iter = if generators.is_empty() {
                self.in_enclosing_scope(|p| p.parse_or_test())?
            } else {
                self.parse_or_test()?
            };
            let ifs = self.collect(|p| {
                while p.eat(T::KwIf) {
                    let cond = p.parse_test_nocond()?;
                    p.stacks.push_value(cond);
                }
                Ok(())
            })?;
            generators.push(CompFor {
                target,
                iter,
                ifs,
                is_async,
            });
            if !matches!(self.peek_kind(), T::KwFor | T::KwAsync) {
                return Ok(generators);
            }
        }
    }

    // ── strings ───────────────────────────────────────────────────────────────

    /// A run of adjacent string tokens, concatenated by the factory.
    fn parse_strings(&mut self) -> ParseResult<Node> {
        let start = self.peek().start;
        let mark = self.stacks.mark();
        while self.at(T::String) {
            let tok = self.bump();
            self.stacks.push_string(StrPiece {
                raw: tok.text,
                start: tok.start,
                end: tok.stop,
                line: tok.line,
                column: tok.column,
            });
        }
        let raw_pieces = self.stacks.take_strings(mark);
        let span = self.span_from(start);
        let mut pieces = Vec::with_capacity(raw_pieces.len());
        for raw in &raw_pieces {
            pieces.push(self.string_piece(raw)?);
        }
        self.factory
            .string_literal(pieces, span)
            .map_err(|message| self.error_at(span, ErrorKind::Tokenize, message))
    }

    fn string_piece(&mut self, piece: &StrPiece<'src>) -> ParseResult<StringPiece<'src>> {
        let span = Span::new(piece.start, piece.end);
        let shape = strings::split_literal(piece.raw)
            .ok_or_else(|| self.error_at(span, ErrorKind::Tokenize, "invalid string literal"))?;
        let segments = if shape.prefix.formatted {
            let scanned = strings::scan_fstring(shape.body)
                .map_err(|message| self.error_at(span, ErrorKind::Tokenize, message))?;
            self.lower_fsegments(piece, shape.body_offset, scanned)?
        } else {
            vec![Segment::Text(shape.body)]
        };
        Ok(StringPiece {
            prefix: shape.prefix,
            segments,
            span,
        })
    }

    /// Parse the replacement fields of an f-string body into expressions.
    fn lower_fsegments(
        &mut self,
        piece: &StrPiece<'src>,
        body_offset: usize,
        scanned: Vec<FSegment<'src>>,
    ) -> ParseResult<Vec<Segment<'src>>> {
        let mut segments = Vec::with_capacity(scanned.len());
        for segment in scanned {
            match segment {
                FSegment::Text(text) => segments.push(Segment::Text(text)),
                FSegment::Field(field) => {
                    if let Some(echo) = field.debug_text {
                        segments.push(Segment::Text(echo));
                    }
                    let origin = origin_within(piece, body_offset + field.expr_offset);
                    let value = self.parse_fragment(field.expr, origin)?;
                    let spec = self.lower_fsegments(piece, body_offset, field.spec)?;
                    let width = field.expr.chars().count() as u32;
                    segments.push(Segment::Value {
                        value,
                        conversion: field.conversion,
                        spec,
                        span: Span::new(origin.char_offset, origin.char_offset + width),
                    });
                }
            }
        }
        Ok(segments)
    }

    /// Parse one f-string replacement expression with a lexer over just its
    /// text, positioned at `origin` in the enclosing source.
    fn parse_fragment(&mut self, expr: &'src str, origin: Origin) -> ParseResult<Node> {
        let outer_lex = std::mem::replace(&mut self.lex, Lexer::fragment(expr, origin));
        let outer_fragment = std::mem::replace(&mut self.in_fragment, true);
        let outer_end = self.prev_end;
        let result = self.parse_fragment_expr();
        self.lex = outer_lex;
        self.in_fragment = outer_fragment;
        self.prev_end = outer_end;
        result
    }

    fn parse_fragment_expr(&mut self) -> ParseResult<Node> {
        let value = if self.at(T::KwYield) {
            self.parse_yield_expr()?
        } else {
            self.parse_testlist_star_expr()?
        };
        let tok = self.peek();
        if tok.kind != T::Eof {
            return Err(self.unexpected(tok));
        }
        Ok(value)
    }
}

/// Source position of byte `offset` inside a string token.
fn origin_within(piece: &StrPiece<'_>, offset: usize) -> Origin {
    let before = piece.raw.get(..offset).unwrap_or(piece.raw);
    let char_offset = piece.start + before.chars().count() as u32;
    match before.rfind('\n') {
        Some(newline) => Origin {
            char_offset,
            line: piece.line + before.matches('\n').count() as u32,
            line_start_char: piece.start + before[..=newline].chars().count() as u32,
        },
        None => Origin {
            char_offset,
            line: piece.line,
            line_start_char: piece.start.saturating_sub(piece.column.saturating_sub(1)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(raw: &str, start: Offset, line: u32, column: u32) -> StrPiece<'_> {
        StrPiece {
            raw,
            start,
            end: start + raw.chars().count() as u32,
            line,
            column,
        }
    }

    #[test]
    fn test_origin_on_same_line() {
        // x = f"a{b}"  -> the string starts at column 5 (offset 4)
        let p = piece("f\"a{b}\"", 4, 1, 5);
        let origin = origin_within(&p, 4);
        assert_eq!(origin.char_offset, 8);
        assert_eq!(origin.line, 1);
        assert_eq!(origin.line_start_char, 0);
    }

    #[test]
    fn test_origin_after_newline_in_triple_quoted() {
        let p = piece("f\"\"\"a\n  {b}\"\"\"", 10, 3, 1);
        let offset = p.raw.find('b').unwrap();
        let origin = origin_within(&p, offset);
        assert_eq!(origin.line, 4);
        assert_eq!(origin.line_start_char, 10 + 6);
        assert_eq!(origin.char_offset, 10 + 9);
    }

    #[test]
    fn test_starts_expression() {
        assert!(starts_expression(T::Name));
        assert!(starts_expression(T::Star));
        assert!(!starts_expression(T::KwIn));
        assert!(!starts_expression(T::RParen));
        assert!(starts_subscript(T::Colon));
    }
}
