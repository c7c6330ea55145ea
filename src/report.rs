use std::fmt;

use serde::Serialize;

use crate::error::{ErrorKind, ParseError};

/// A syntax error located in a file, ready for printing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub kind: ErrorKind,
    pub message: String,
}

impl Diagnostic {
    pub fn from_error(file: impl Into<String>, err: &ParseError) -> Self {
        Self {
            file: file.into(),
            line: err.line,
            col: err.column,
            kind: err.kind,
            message: err.message.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} {}",
            self.file,
            self.line,
            self.col,
            self.kind.python_name(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic {
            file: "src/foo.py".to_string(),
            line: 12,
            col: 5,
            kind: ErrorKind::Semantic,
            message: "'break' outside loop".to_string(),
        };
        assert_eq!(d.to_string(), "src/foo.py:12:5: SyntaxError 'break' outside loop");
    }

    #[test]
    fn test_from_parse_error() {
        let err = parse_module("if x:\npass\n").unwrap_err();
        let d = Diagnostic::from_error("a.py", &err);
        assert_eq!(d.kind, ErrorKind::Indentation);
        assert_eq!((d.line, d.col), (2, 1));
        assert!(d.to_string().starts_with("a.py:2:1: IndentationError"));
    }
}
