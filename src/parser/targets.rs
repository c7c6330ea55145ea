//! Checks on expressions used as assignment, deletion and loop targets.
//!
//! Targets are parsed as ordinary expressions and validated afterwards;
//! valid names are declared in the current scope as they are checked.

use crate::error::{ErrorKind, ParseResult};
use crate::parser::builder::Parser;
use crate::parser::factory::NodeFactory;
use crate::sst::{Node, NodeKind};

/// Where a target appears. Only deletion changes the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetContext {
    Assign,
    Delete,
    For,
    With,
    Comprehension,
}

impl TargetContext {
    fn verb(self) -> &'static str {
        match self {
            TargetContext::Delete => "delete",
            _ => "assign to",
        }
    }
}

impl<F: NodeFactory + ?Sized> Parser<'_, '_, F> {
    pub(super) fn check_store_target(&mut self, node: &Node, ctx: TargetContext) -> ParseResult<()> {
        self.check_target(node, ctx, false)
    }

    fn check_target(&mut self, node: &Node, ctx: TargetContext, nested: bool) -> ParseResult<()> {
        match &node.kind {
            NodeKind::Name(name) => {
                if name == "__debug__" {
                    return Err(self.error_at(
                        node.span(),
                        ErrorKind::Semantic,
                        format!("cannot {} __debug__", ctx.verb()),
                    ));
                }
                self.scopes.create_local(name);
                Ok(())
            }
            NodeKind::Attribute { .. } | NodeKind::Subscript { .. } => Ok(()),
            NodeKind::Tuple(elts) | NodeKind::List(elts) => {
                let starred = elts
                    .iter()
                    .filter(|e| matches!(e.kind, NodeKind::Starred(_)))
                    .count();
                if starred > 1 && ctx != TargetContext::Delete {
                    return Err(self.error_at(
                        node.span(),
                        ErrorKind::Semantic,
                        "multiple starred expressions in assignment",
                    ));
                }
                for elt in elts {
                    self.check_target(elt, ctx, true)?;
                }
                Ok(())
            }
            NodeKind::Starred(inner) => {
                if ctx == TargetContext::Delete {
                    return Err(self.error_at(node.span(), ErrorKind::Semantic, "cannot delete starred"));
                }
                if !nested {
                    return Err(self.error_at(
                        node.span(),
                        ErrorKind::Semantic,
                        "starred assignment target must be in a list or tuple",
                    ));
                }
                self.check_target(inner, ctx, false)
            }
            _ => Err(self.error_at(
                node.span(),
                ErrorKind::Semantic,
                format!("cannot {} {}", ctx.verb(), node.describe()),
            )),
        }
    }

    /// Augmented assignment takes a single name, attribute or subscript.
    pub(super) fn check_aug_target(&mut self, node: &Node) -> ParseResult<()> {
        match &node.kind {
            NodeKind::Name(_) => self.check_store_target(node, TargetContext::Assign),
            NodeKind::Attribute { .. } | NodeKind::Subscript { .. } => Ok(()),
            _ => Err(self.error_at(
                node.span(),
                ErrorKind::Semantic,
                format!(
                    "'{}' is an illegal expression for augmented assignment",
                    node.describe()
                ),
            )),
        }
    }

    /// A starred expression on its own is not a value.
    pub(super) fn reject_bare_starred(&self, node: &Node) -> ParseResult<()> {
        if matches!(node.kind, NodeKind::Starred(_)) {
            return Err(self.error_at(
                node.span(),
                ErrorKind::Semantic,
                "can't use starred expression here",
            ));
        }
        Ok(())
    }
}
