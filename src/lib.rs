//! pyfront: a Python 3 front-end.
//!
//! Source text goes through an indentation-aware [`parser::lexer`], then a
//! recursive-descent builder that tracks lexical scopes and loop state and
//! produces an [`sst::Sst`]. The [`batch`] and [`discovery`] modules drive
//! the parser over whole directory trees.

pub mod batch;
pub mod discovery;
pub mod error;
pub mod location;
pub mod parser;
pub mod report;
pub mod sst;

pub use error::{ErrorKind, ParseError, ParseResult};
pub use parser::scope::LexicalFrame;
pub use parser::{
    ParseMode, parse, parse_inline, parse_module, parse_single_statement, parse_with_arguments,
    parse_with_factory,
};
pub use sst::{Node, NodeKind, Sst};
