//! Syntax errors raised by the lexer and the tree builder.
//!
//! Every failure carries a user-facing message plus the source position it
//! refers to. The [`ErrorKind`] distinguishes the categories a host runtime
//! surfaces differently (`IndentationError`, `TabError`, plain
//! `SyntaxError`), and flags interactive input that is merely incomplete.

use serde::Serialize;
use thiserror::Error;

use crate::parser::lexer::Token;
use crate::sst::{Offset, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Unexpected indent, missing indented block, or a dedent to a level
    /// that never existed.
    Indentation,
    /// Tabs and spaces mixed so that the indentation is ambiguous.
    Tab,
    /// A backslash line continuation immediately before end of input.
    LineJoiningEof,
    /// A string literal with no closing quote.
    UnterminatedString,
    /// A character or literal the lexer could not make sense of.
    Tokenize,
    /// Input that does not fit the grammar.
    Grammar,
    /// Grammatically valid input rejected by a context rule (`break` outside
    /// a loop, duplicate parameter, invalid assignment target, ...).
    Semantic,
    /// Interactive input that ended while a construct was still open.
    Incomplete,
}

impl ErrorKind {
    /// The exception class a Python runtime raises for this kind of error.
    pub fn python_name(self) -> &'static str {
        match self {
            ErrorKind::Indentation => "IndentationError",
            ErrorKind::Tab => "TabError",
            _ => "SyntaxError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}: {message} (line {line}, column {column})", .kind.python_name())]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    /// 1-indexed line.
    pub line: u32,
    /// 1-indexed column, counted in characters.
    pub column: u32,
    pub start: Offset,
    pub end: Offset,
    /// Text of the offending token, when there is one.
    pub token: Option<String>,
}

pub type ParseResult<T> = Result<T, ParseError>;

impl ParseError {
    /// An error positioned on a token.
    pub fn at_token(kind: ErrorKind, message: impl Into<String>, token: &Token<'_>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: token.line,
            column: token.column,
            start: token.start,
            end: token.stop,
            token: if token.text.is_empty() {
                None
            } else {
                Some(token.text.to_string())
            },
        }
    }

    /// An error positioned on a node range; `line`/`column` are derived from
    /// `source`.
    pub fn at_span(kind: ErrorKind, message: impl Into<String>, span: Span, source: &str) -> Self {
        let (line, column) = crate::location::char_offset_to_line_col(source, span.start);
        Self {
            kind,
            message: message.into(),
            line,
            column,
            start: span.start,
            end: span.end,
            token: None,
        }
    }

    pub fn is_incomplete(&self) -> bool {
        self.kind == ErrorKind::Incomplete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_python_name() {
        let err = ParseError::at_span(
            ErrorKind::Tab,
            "inconsistent use of tabs and spaces in indentation",
            Span::new(4, 5),
            "if x:\n\tpass\n",
        );
        assert_eq!(
            err.to_string(),
            "TabError: inconsistent use of tabs and spaces in indentation (line 1, column 5)"
        );
    }

    #[test]
    fn test_grammar_is_syntax_error() {
        assert_eq!(ErrorKind::Grammar.python_name(), "SyntaxError");
        assert_eq!(ErrorKind::Indentation.python_name(), "IndentationError");
    }
}
