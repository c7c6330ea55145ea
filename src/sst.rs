//! Syntax Structure Tree produced by the parser.
//!
//! Design goals:
//! - One tagged node type: every statement and expression is a [`Node`]
//!   carrying a half-open `[start, end)` range of *character* offsets into
//!   the source, so consumers can highlight or slice without re-lexing.
//! - Owned: nodes own their children and hold no borrows of the source, so a
//!   finished [`Sst`] can outlive the buffer it was parsed from.
//! - Scope-aware: function, class, lambda and comprehension nodes keep the
//!   [`ScopeId`] of the scope they opened; the arena lives on [`Sst`].

use crate::parser::scope::{ScopeId, Scopes};
use serde::Serialize;

// ── Location ─────────────────────────────────────────────────────────────────

/// Character offset into the source text (0-indexed).
pub type Offset = u32;

/// A half-open `[start, end)` character range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: Offset,
    pub end: Offset,
}

impl Span {
    pub fn new(start: Offset, end: Offset) -> Self {
        Self { start, end }
    }
}

// ── Root ─────────────────────────────────────────────────────────────────────

/// Which entry point produced a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RootKind {
    Module,
    Statement,
    WithArguments,
    Inline,
}

/// The result of one parse call: the root node plus the scope arena that the
/// tree's [`ScopeId`]s index into.
#[derive(Debug, Clone, Serialize)]
pub struct Sst {
    pub kind: RootKind,
    pub root: Node,
    pub root_scope: ScopeId,
    pub scopes: Scopes,
}

// ── Nodes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub start: Offset,
    pub end: Offset,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
            kind,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    pub fn boxed(self) -> Box<Node> {
        Box::new(self)
    }

    /// `true` for integer, float and imaginary literals.
    pub fn is_number(&self) -> bool {
        matches!(self.kind, NodeKind::Literal(Literal::Number(_)))
    }

    /// How the node is named in "cannot assign to ..." style messages.
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            NodeKind::Literal(Literal::None) => "None",
            NodeKind::Literal(Literal::Bool(true)) => "True",
            NodeKind::Literal(Literal::Bool(false)) => "False",
            NodeKind::Literal(Literal::Ellipsis) => "Ellipsis",
            NodeKind::Literal(_) => "literal",
            NodeKind::FormattedString(_) | NodeKind::FormattedValue { .. } => "f-string expression",
            NodeKind::Call { .. } => "function call",
            NodeKind::BinOp { .. } | NodeKind::UnaryOp { .. } | NodeKind::BoolOp { .. } => {
                "operator"
            }
            NodeKind::Compare { .. } => "comparison",
            NodeKind::Lambda { .. } => "lambda",
            NodeKind::IfExp { .. } => "conditional expression",
            NodeKind::NamedExpr { .. } => "named expression",
            NodeKind::Await(_) => "await expression",
            NodeKind::Yield(_) | NodeKind::YieldFrom(_) => "yield expression",
            NodeKind::Dict { .. } => "dict display",
            NodeKind::Set(_) => "set display",
            NodeKind::Comprehension(c) => c.kind.describe(),
            NodeKind::Starred(_) => "starred",
            NodeKind::Attribute { .. } => "attribute",
            NodeKind::Subscript { .. } => "subscript",
            NodeKind::Slice { .. } => "slice",
            NodeKind::Name(_) => "name",
            NodeKind::Tuple(_) => "tuple",
            NodeKind::List(_) => "list",
            _ => "statement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    // ── roots ───────────────────────────────────────────────────────────────
    Module {
        body: Vec<Node>,
    },
    Interactive {
        body: Vec<Node>,
    },
    /// A module body compiled as if it were a function taking `params`.
    FunctionBody {
        params: Vec<String>,
        body: Vec<Node>,
        scope: ScopeId,
    },
    /// A single expression evaluated inside a caller-supplied lexical frame.
    /// `frame_locals` lists the free names that resolve to that frame.
    InlineExpression {
        value: Box<Node>,
        frame_locals: Vec<String>,
    },

    // ── simple statements ───────────────────────────────────────────────────
    Expr(Box<Node>),
    /// An interactive expression statement whose value gets displayed.
    PrintExpr(Box<Node>),
    Assign {
        targets: Vec<Node>,
        value: Box<Node>,
    },
    AugAssign {
        target: Box<Node>,
        op: BinOp,
        value: Box<Node>,
    },
    AnnAssign {
        target: Box<Node>,
        annotation: Box<Node>,
        value: Option<Box<Node>>,
        simple: bool,
    },
    Delete(Vec<Node>),
    Pass,
    Break,
    Continue,
    Return(Option<Box<Node>>),
    Raise {
        exc: Option<Box<Node>>,
        cause: Option<Box<Node>>,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Assert {
        test: Box<Node>,
        msg: Option<Box<Node>>,
    },
    Import(Vec<Alias>),
    ImportFrom {
        module: Option<String>,
        /// Empty for `from m import *`.
        names: Vec<Alias>,
        level: u32,
    },

    // ── compound statements ─────────────────────────────────────────────────
    If {
        test: Box<Node>,
        body: Vec<Node>,
        orelse: Vec<Node>,
    },
    While {
        test: Box<Node>,
        body: Vec<Node>,
        orelse: Vec<Node>,
        flags: LoopFlags,
    },
    For {
        target: Box<Node>,
        iter: Box<Node>,
        body: Vec<Node>,
        orelse: Vec<Node>,
        is_async: bool,
        flags: LoopFlags,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Node>,
        is_async: bool,
    },
    Try {
        body: Vec<Node>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Node>,
        finalbody: Vec<Node>,
    },
    FunctionDef(Box<FunctionDef>),
    ClassDef(Box<ClassDef>),

    // ── expressions ─────────────────────────────────────────────────────────
    BoolOp {
        op: BoolOpKind,
        left: Box<Node>,
        right: Box<Node>,
    },
    NamedExpr {
        target: Box<Node>,
        value: Box<Node>,
    },
    BinOp {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Lambda {
        params: Box<Parameters>,
        body: Box<Node>,
        scope: ScopeId,
    },
    IfExp {
        test: Box<Node>,
        body: Box<Node>,
        orelse: Box<Node>,
    },
    /// `keys[i]` is `None` for a `**mapping` entry.
    Dict {
        keys: Vec<Option<Node>>,
        values: Vec<Node>,
    },
    Set(Vec<Node>),
    List(Vec<Node>),
    Tuple(Vec<Node>),
    Comprehension(Box<Comprehension>),
    Await(Box<Node>),
    Yield(Option<Box<Node>>),
    YieldFrom(Box<Node>),
    /// A comparison chain: `operands.len() == ops.len() + 1`.
    Compare {
        operands: Vec<Node>,
        ops: Vec<CmpOp>,
    },
    Call {
        func: Box<Node>,
        args: Vec<Node>,
        keywords: Vec<Keyword>,
    },
    /// f-string: a sequence of `Literal(Str)` and `FormattedValue` parts.
    FormattedString(Vec<Node>),
    FormattedValue {
        value: Box<Node>,
        conversion: Option<char>,
        format_spec: Option<Box<Node>>,
    },
    Literal(Literal),
    Attribute {
        value: Box<Node>,
        attr: String,
    },
    Subscript {
        value: Box<Node>,
        slice: Box<Node>,
    },
    Slice {
        lower: Option<Box<Node>>,
        upper: Option<Box<Node>>,
        step: Option<Box<Node>>,
    },
    Starred(Box<Node>),
    Name(String),
}

// ── Literals ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    None,
    Bool(bool),
    Ellipsis,
    Number(Number),
    Str(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Number {
    Int(i64),
    /// An integer that does not fit `i64`; `digits` are in `radix`, without
    /// prefix or underscores.
    Big {
        negative: bool,
        radix: u32,
        digits: String,
    },
    Float(f64),
    Imaginary(f64),
}

impl Number {
    /// Arithmetic negation, used to fold `-<literal>` into a single literal.
    pub fn negate(self) -> Number {
        match self {
            Number::Int(v) => match v.checked_neg() {
                Some(n) => Number::Int(n),
                None => Number::Big {
                    negative: false,
                    radix: 10,
                    digits: v.unsigned_abs().to_string(),
                },
            },
            Number::Big {
                negative,
                radix,
                digits,
            } => Number::Big {
                negative: !negative,
                radix,
                digits,
            },
            Number::Float(f) => Number::Float(-f),
            Number::Imaginary(f) => Number::Imaginary(-f),
        }
    }
}

// ── Operators ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
    FloorDiv,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mult => "*",
            BinOp::MatMult => "@",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitAnd => "&",
            BinOp::FloorDiv => "//",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Invert,
    Not,
    UAdd,
    USub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoolOpKind {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

// ── Loop flags ───────────────────────────────────────────────────────────────

/// Whether a loop body contains `break` / `continue` aimed at that loop.
/// When both are false the execution engine can skip loop-exit machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoopFlags {
    pub contains_break: bool,
    pub contains_continue: bool,
}

// ── Definitions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Node>,
    pub default: Option<Node>,
    pub start: Offset,
    pub end: Offset,
}

/// A canonical parameter list: `posonly, / , args, *vararg, kwonly, **kwarg`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Parameters {
    pub posonly: Vec<Param>,
    pub args: Vec<Param>,
    pub vararg: Option<Param>,
    pub kwonly: Vec<Param>,
    pub kwarg: Option<Param>,
}

impl Parameters {
    /// All parameter names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.posonly
            .iter()
            .chain(self.args.iter())
            .chain(self.vararg.iter())
            .chain(self.kwonly.iter())
            .chain(self.kwarg.iter())
            .map(|p| p.name.as_str())
            .collect()
    }
}

/// One `name=value` or `**value` (with `arg == None`) call argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Node,
    pub start: Offset,
    pub end: Offset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Parameters,
    pub returns: Option<Node>,
    pub decorators: Vec<Node>,
    pub body: Vec<Node>,
    pub is_async: bool,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Node>,
    pub keywords: Vec<Keyword>,
    pub decorators: Vec<Node>,
    pub body: Vec<Node>,
    pub scope: ScopeId,
}

// ── Imports / with / except ──────────────────────────────────────────────────

/// For `import os.path`: `name = "os.path"`, `asname = None`.
/// For `from x import y as z`: `name = "y"`, `asname = Some("z")`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
    pub start: Offset,
    pub end: Offset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithItem {
    pub context: Node,
    pub target: Option<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptHandler {
    pub type_expr: Option<Node>,
    pub name: Option<String>,
    pub body: Vec<Node>,
    pub start: Offset,
    pub end: Offset,
}

// ── Comprehensions ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

impl ComprehensionKind {
    pub fn describe(self) -> &'static str {
        match self {
            ComprehensionKind::List => "list comprehension",
            ComprehensionKind::Set => "set comprehension",
            ComprehensionKind::Dict => "dict comprehension",
            ComprehensionKind::Generator => "generator expression",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompFor {
    pub target: Node,
    pub iter: Node,
    pub ifs: Vec<Node>,
    pub is_async: bool,
}

/// `element` is the key for dict comprehensions, with `value` set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comprehension {
    pub kind: ComprehensionKind,
    pub element: Node,
    pub value: Option<Node>,
    pub generators: Vec<CompFor>,
    pub scope: ScopeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negate_int() {
        assert_eq!(Number::Int(2).negate(), Number::Int(-2));
        assert_eq!(Number::Int(-2).negate(), Number::Int(2));
    }

    #[test]
    fn test_negate_min_int_goes_big() {
        let n = Number::Int(i64::MIN).negate();
        assert!(matches!(n, Number::Big { negative: false, radix: 10, .. }));
    }

    #[test]
    fn test_describe_literals() {
        let t = Node::new(NodeKind::Literal(Literal::Bool(true)), Span::new(0, 4));
        assert_eq!(t.describe(), "True");
        let n = Node::new(NodeKind::Literal(Literal::Number(Number::Int(1))), Span::new(0, 1));
        assert_eq!(n.describe(), "literal");
        assert!(n.is_number());
    }

    #[test]
    fn test_cmp_op_text() {
        assert_eq!(CmpOp::LtE.as_str(), "<=");
        assert_eq!(CmpOp::NotIn.as_str(), "not in");
    }
}
