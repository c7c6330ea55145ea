//! Node construction seam.
//!
//! The builder hands every composite construct to a [`NodeFactory`] instead
//! of building nodes itself, so a host can substitute its own construction
//! (interning, extra bookkeeping) without touching the grammar. String
//! literals go through the factory as well: escape decoding and implicit
//! concatenation are node construction, not parsing.

use crate::parser::strings::{self, StringPrefix};
use crate::sst::{
    Alias, ClassDef, Comprehension, FunctionDef, Literal, Node, NodeKind, Span, WithItem,
};

/// One replacement-field-aware piece of a string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'src> {
    /// Literal text, escapes not yet decoded.
    Text(&'src str),
    Value {
        value: Node,
        conversion: Option<char>,
        spec: Vec<Segment<'src>>,
        span: Span,
    },
}

/// One string token of an implicitly concatenated run.
#[derive(Debug, Clone, PartialEq)]
pub struct StringPiece<'src> {
    pub prefix: StringPrefix,
    pub segments: Vec<Segment<'src>>,
    pub span: Span,
}

pub trait NodeFactory {
    fn import(&mut self, names: Vec<Alias>, span: Span) -> Node;

    fn import_from(
        &mut self,
        module: Option<String>,
        names: Vec<Alias>,
        level: u32,
        span: Span,
    ) -> Node;

    fn assignment(&mut self, targets: Vec<Node>, value: Node, span: Span) -> Node;

    fn comprehension(&mut self, comprehension: Comprehension, span: Span) -> Node;

    fn with_statement(
        &mut self,
        items: Vec<WithItem>,
        body: Vec<Node>,
        is_async: bool,
        span: Span,
    ) -> Node;

    fn function_def(&mut self, def: FunctionDef, span: Span) -> Node;

    fn class_def(&mut self, def: ClassDef, span: Span) -> Node;

    /// Build a literal from adjacent string tokens. An `Err` carries the
    /// message for a syntax error over `span`.
    fn string_literal(&mut self, pieces: Vec<StringPiece<'_>>, span: Span) -> Result<Node, String>;
}

/// The default factory: builds plain [`Node`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SstFactory;

impl NodeFactory for SstFactory {
    fn import(&mut self, names: Vec<Alias>, span: Span) -> Node {
        Node::new(NodeKind::Import(names), span)
    }

    fn import_from(
        &mut self,
        module: Option<String>,
        names: Vec<Alias>,
        level: u32,
        span: Span,
    ) -> Node {
        Node::new(
            NodeKind::ImportFrom {
                module,
                names,
                level,
            },
            span,
        )
    }

    fn assignment(&mut self, targets: Vec<Node>, value: Node, span: Span) -> Node {
        Node::new(
            NodeKind::Assign {
                targets,
                value: value.boxed(),
            },
            span,
        )
    }

    fn comprehension(&mut self, comprehension: Comprehension, span: Span) -> Node {
        Node::new(NodeKind::Comprehension(Box::new(comprehension)), span)
    }

    fn with_statement(
        &mut self,
        items: Vec<WithItem>,
        body: Vec<Node>,
        is_async: bool,
        span: Span,
    ) -> Node {
        Node::new(
            NodeKind::With {
                items,
                body,
                is_async,
            },
            span,
        )
    }

    fn function_def(&mut self, def: FunctionDef, span: Span) -> Node {
        Node::new(NodeKind::FunctionDef(Box::new(def)), span)
    }

    fn class_def(&mut self, def: ClassDef, span: Span) -> Node {
        Node::new(NodeKind::ClassDef(Box::new(def)), span)
    }

    fn string_literal(&mut self, pieces: Vec<StringPiece<'_>>, span: Span) -> Result<Node, String> {
        let is_bytes = pieces.first().is_some_and(|p| p.prefix.bytes);
        if pieces.iter().any(|p| p.prefix.bytes != is_bytes) {
            return Err("cannot mix bytes and nonbytes literals".to_string());
        }

        if is_bytes {
            let mut out = Vec::new();
            for piece in &pieces {
                for segment in &piece.segments {
                    if let Segment::Text(text) = segment {
                        out.extend(strings::decode_bytes(text, piece.prefix.raw)?);
                    }
                }
            }
            return Ok(Node::new(NodeKind::Literal(Literal::Bytes(out)), span));
        }

        if !pieces.iter().any(|p| p.prefix.formatted) {
            let mut out = String::new();
            for piece in &pieces {
                for segment in &piece.segments {
                    if let Segment::Text(text) = segment {
                        out.push_str(&strings::decode_str(text, piece.prefix.raw)?);
                    }
                }
            }
            return Ok(Node::new(NodeKind::Literal(Literal::Str(out)), span));
        }

        let mut parts = Vec::new();
        let mut pending = PendingText::default();
        for piece in pieces {
            formatted_parts(piece.segments, piece.prefix.raw, piece.span, &mut parts, &mut pending)?;
        }
        pending.flush(&mut parts);
        Ok(Node::new(NodeKind::FormattedString(parts), span))
    }
}

/// Decoded text waiting to become one `Literal(Str)` part, spanning the
/// source pieces it was taken from.
#[derive(Debug, Default)]
struct PendingText {
    text: String,
    span: Option<Span>,
}

impl PendingText {
    fn push(&mut self, text: &str, from: Span) {
        if text.is_empty() {
            return;
        }
        self.text.push_str(text);
        self.span = Some(match self.span {
            Some(span) => Span::new(span.start, from.end.max(span.end)),
            None => from,
        });
    }

    fn flush(&mut self, parts: &mut Vec<Node>) {
        if let Some(span) = self.span.take() {
            let text = std::mem::take(&mut self.text);
            parts.push(Node::new(NodeKind::Literal(Literal::Str(text)), span));
        }
    }
}

/// Lower segments to `Literal(Str)` / `FormattedValue` parts, merging runs of
/// adjacent text into one literal.
fn formatted_parts(
    segments: Vec<Segment<'_>>,
    raw: bool,
    piece_span: Span,
    parts: &mut Vec<Node>,
    pending: &mut PendingText,
) -> Result<(), String> {
    for segment in segments {
        match segment {
            Segment::Text(text) => pending.push(&strings::decode_str(text, raw)?, piece_span),
            Segment::Value {
                value,
                conversion,
                spec,
                span,
            } => {
                pending.flush(parts);
                let format_spec = if spec.is_empty() {
                    None
                } else {
                    let mut spec_parts = Vec::new();
                    let mut spec_text = PendingText::default();
                    formatted_parts(spec, raw, span, &mut spec_parts, &mut spec_text)?;
                    spec_text.flush(&mut spec_parts);
                    Some(Node::new(NodeKind::FormattedString(spec_parts), span).boxed())
                };
                parts.push(Node::new(
                    NodeKind::FormattedValue {
                        value: value.boxed(),
                        conversion,
                        format_spec,
                    },
                    span,
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(prefix: StringPrefix, segments: Vec<Segment<'_>>) -> StringPiece<'_> {
        StringPiece {
            prefix,
            segments,
            span: Span::new(0, 1),
        }
    }

    fn plain() -> StringPrefix {
        StringPrefix::default()
    }

    #[test]
    fn test_concatenates_plain_strings() {
        let mut f = SstFactory;
        let node = f
            .string_literal(
                vec![
                    piece(plain(), vec![Segment::Text("a\\n")]),
                    piece(plain(), vec![Segment::Text("b")]),
                ],
                Span::new(0, 9),
            )
            .unwrap();
        assert_eq!(node.kind, NodeKind::Literal(Literal::Str("a\nb".to_string())));
    }

    #[test]
    fn test_rejects_mixed_bytes() {
        let bytes = StringPrefix {
            bytes: true,
            ..StringPrefix::default()
        };
        let err = SstFactory
            .string_literal(
                vec![piece(bytes, vec![]), piece(plain(), vec![])],
                Span::new(0, 5),
            )
            .unwrap_err();
        assert_eq!(err, "cannot mix bytes and nonbytes literals");
    }

    #[test]
    fn test_formatted_merges_adjacent_text() {
        let formatted = StringPrefix {
            formatted: true,
            ..StringPrefix::default()
        };
        let value = Node::new(NodeKind::Name("x".to_string()), Span::new(3, 4));
        let node = SstFactory
            .string_literal(
                vec![
                    piece(plain(), vec![Segment::Text("a")]),
                    piece(
                        formatted,
                        vec![
                            Segment::Text("b"),
                            Segment::Value {
                                value,
                                conversion: None,
                                spec: vec![],
                                span: Span::new(3, 4),
                            },
                        ],
                    ),
                ],
                Span::new(0, 8),
            )
            .unwrap();
        let NodeKind::FormattedString(parts) = node.kind else {
            panic!("expected f-string");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].kind, NodeKind::Literal(Literal::Str("ab".to_string())));
        assert!(matches!(parts[1].kind, NodeKind::FormattedValue { .. }));
    }

    #[test]
    fn test_merged_text_keeps_its_source_span() {
        let formatted = StringPrefix {
            formatted: true,
            ..StringPrefix::default()
        };
        let value = Node::new(NodeKind::Name("b".to_string()), Span::new(7, 8));
        let pieces = vec![
            StringPiece {
                prefix: plain(),
                segments: vec![Segment::Text("a")],
                span: Span::new(0, 3),
            },
            StringPiece {
                prefix: formatted,
                segments: vec![Segment::Value {
                    value,
                    conversion: None,
                    spec: vec![],
                    span: Span::new(6, 9),
                }],
                span: Span::new(4, 10),
            },
            StringPiece {
                prefix: plain(),
                segments: vec![Segment::Text("c")],
                span: Span::new(11, 14),
            },
        ];
        let node = SstFactory.string_literal(pieces, Span::new(0, 14)).unwrap();
        let NodeKind::FormattedString(parts) = node.kind else {
            panic!("expected f-string");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!((parts[0].start, parts[0].end), (0, 3));
        assert_eq!((parts[2].start, parts[2].end), (11, 14));
    }
}
