//! Auxiliary stacks for variable-arity productions.
//!
//! Suites, displays, comparison chains and the like push their children onto
//! one shared value stack and take them off in one slice when the production
//! completes. A [`StackMark`] records the height when a production starts;
//! taking from the mark returns the children in source order, and resetting
//! to the mark discards whatever a failed production left behind.
//!
//! Adjacent string literals go on the string stack until the whole run has
//! been seen, so they can be concatenated into one literal.

use crate::sst::{Node, Offset};

/// One string-literal token awaiting concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrPiece<'src> {
    /// Source text, prefix and quotes included.
    pub raw: &'src str,
    pub start: Offset,
    pub end: Offset,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackMark {
    values: usize,
    strings: usize,
}

#[derive(Debug, Default)]
pub struct BuilderStacks<'src> {
    values: Vec<Node>,
    strings: Vec<StrPiece<'src>>,
}

impl<'src> BuilderStacks<'src> {
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(64),
            strings: Vec::with_capacity(8),
        }
    }

    pub fn mark(&self) -> StackMark {
        StackMark {
            values: self.values.len(),
            strings: self.strings.len(),
        }
    }

    pub fn push_value(&mut self, node: Node) {
        self.values.push(node);
    }

    pub fn push_string(&mut self, piece: StrPiece<'src>) {
        self.strings.push(piece);
    }

    pub fn take_values(&mut self, mark: StackMark) -> Vec<Node> {
        self.values.split_off(mark.values.min(self.values.len()))
    }

    pub fn take_strings(&mut self, mark: StackMark) -> Vec<StrPiece<'src>> {
        self.strings.split_off(mark.strings.min(self.strings.len()))
    }

    /// Drop everything pushed since `mark`.
    pub fn reset(&mut self, mark: StackMark) {
        self.values.truncate(mark.values);
        self.strings.truncate(mark.strings);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sst::{NodeKind, Span};

    fn name(n: &str) -> Node {
        Node::new(NodeKind::Name(n.to_string()), Span::new(0, 1))
    }

    #[test]
    fn test_take_returns_in_push_order() {
        let mut stacks = BuilderStacks::new();
        stacks.push_value(name("outer"));
        let mark = stacks.mark();
        stacks.push_value(name("a"));
        stacks.push_value(name("b"));
        let taken = stacks.take_values(mark);
        assert_eq!(taken, vec![name("a"), name("b")]);
        assert_eq!(stacks.take_values(StackMark { values: 0, strings: 0 }), vec![name("outer")]);
        assert!(stacks.is_empty());
    }

    #[test]
    fn test_reset_discards_partial_work() {
        let mut stacks = BuilderStacks::new();
        let mark = stacks.mark();
        stacks.push_value(name("a"));
        stacks.push_string(StrPiece {
            raw: "'x'",
            start: 0,
            end: 3,
            line: 1,
            column: 1,
        });
        stacks.reset(mark);
        assert!(stacks.is_empty());
    }
}
