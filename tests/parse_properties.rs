use pretty_assertions::assert_eq;
use pyfront::location::slice_chars;
use pyfront::parser::lexer::{Channel, TokenKind, tokenize};
use pyfront::sst::{CmpOp, ComprehensionKind, Literal, LoopFlags, Number, UnaryOp};
use pyfront::{ErrorKind, Node, NodeKind, ParseError, Sst, parse_module};

// ── helpers ──────────────────────────────────────────────────────────────────

fn body(sst: &Sst) -> &[Node] {
    match &sst.root.kind {
        NodeKind::Module { body } => body,
        other => panic!("expected module, got {other:?}"),
    }
}

/// The value of the single expression statement in `src`.
fn expr(src: &str) -> NodeKind {
    let sst = parse_module(src).unwrap();
    match &body(&sst)[0].kind {
        NodeKind::Expr(value) => value.kind.clone(),
        other => panic!("expected expression statement, got {other:?}"),
    }
}

fn error(src: &str) -> ParseError {
    parse_module(src).unwrap_err()
}

fn structural(src: &str) -> Vec<TokenKind> {
    tokenize(src)
        .into_iter()
        .filter(|t| t.channel == Channel::Default)
        .map(|t| t.kind)
        .filter(|k| matches!(k, TokenKind::Indent | TokenKind::Dedent | TokenKind::Newline | TokenKind::Eof))
        .collect()
}

// ── indentation ──────────────────────────────────────────────────────────────

#[test]
fn test_indents_balance_by_eof() {
    let src = "def f():\n    if x:\n        for y in z:\n            pass\n    return 1\nclass C:\n    pass\n";
    let kinds = structural(src);
    let mut depth: i32 = 0;
    for kind in &kinds {
        match kind {
            TokenKind::Indent => depth += 1,
            TokenKind::Dedent => depth -= 1,
            _ => {}
        }
        assert!(depth >= 0);
    }
    assert_eq!(depth, 0);
    assert_eq!(kinds.last(), Some(&TokenKind::Eof));
}

#[test]
fn test_tab_after_eight_spaces_is_tab_error() {
    let src = "if x:\n        a = 1\n\tb = 2\n";
    let kinds: Vec<TokenKind> = tokenize(src).into_iter().map(|t| t.kind).collect();
    assert!(kinds.contains(&TokenKind::TabError));

    let err = error(src);
    assert_eq!(err.kind, ErrorKind::Tab);
    assert_eq!(err.line, 3);
}

#[test]
fn test_ambiguous_tab_indents_are_tab_errors() {
    let grows_only_by_tab_stop = "if x:\n       if y:\n\tb\n";
    assert_eq!(error(grows_only_by_tab_stop).kind, ErrorKind::Tab);

    let dedent_to_ambiguous_level = "if x:\n\tif y:\n\t c\n        d\n";
    let err = error(dedent_to_ambiguous_level);
    assert_eq!(err.kind, ErrorKind::Tab);
    assert_eq!(err.line, 4);
}

#[test]
fn test_eof_synthesizes_newline_then_dedent() {
    let kinds = structural("if True:\n    pass");
    assert_eq!(
        kinds,
        vec![
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_unindent_mismatch_is_indentation_error() {
    let err = error("if x:\n    a\n  b\n");
    assert_eq!(err.kind, ErrorKind::Indentation);
    assert_eq!(err.message, "unindent does not match any outer indentation level");
}

#[test]
fn test_missing_block_is_indentation_error() {
    let err = error("while x:\npass\n");
    assert_eq!(err.kind, ErrorKind::Indentation);
    assert_eq!(err.message, "expected an indented block");
}

// ── lexical error taxonomy ───────────────────────────────────────────────────

#[test]
fn test_line_continuation_at_eof() {
    let err = error("x = 1 + \\");
    assert_eq!(err.kind, ErrorKind::LineJoiningEof);
}

#[test]
fn test_unterminated_strings() {
    let err = error("s = 'abc\n");
    assert_eq!(err.kind, ErrorKind::UnterminatedString);
    assert_eq!(err.message, "unterminated string literal");

    let err = error("s = \"\"\"abc\n");
    assert_eq!(err.kind, ErrorKind::UnterminatedString);
    assert_eq!(err.message, "unterminated triple-quoted string literal");
}

#[test]
fn test_incomplete_only_in_interactive_mode() {
    let err = pyfront::parse_single_statement("if x:\n", true).unwrap_err();
    assert!(err.is_incomplete());
    assert_eq!(err.kind.python_name(), "SyntaxError");

    let err = error("if x:\n");
    assert!(!err.is_incomplete());
}

// ── expressions ──────────────────────────────────────────────────────────────

#[test]
fn test_tuple_collapse() {
    match expr("(1,)") {
        NodeKind::Tuple(items) => assert_eq!(items.len(), 1),
        other => panic!("expected tuple, got {other:?}"),
    }
    assert_eq!(expr("(1)"), NodeKind::Literal(Literal::Number(Number::Int(1))));
    assert_eq!(expr("()"), NodeKind::Tuple(Vec::new()));
}

#[test]
fn test_double_negation_folds() {
    assert_eq!(expr("--2"), NodeKind::Literal(Literal::Number(Number::Int(2))));
    match expr("-x") {
        NodeKind::UnaryOp { op, operand } => {
            assert_eq!(op, UnaryOp::USub);
            assert_eq!(operand.kind, NodeKind::Name("x".to_string()));
        }
        other => panic!("expected unary op, got {other:?}"),
    }
}

#[test]
fn test_chained_comparison_is_one_node() {
    match expr("a < b <= c") {
        NodeKind::Compare { operands, ops } => {
            let names: Vec<NodeKind> = operands.into_iter().map(|n| n.kind).collect();
            assert_eq!(
                names,
                vec![
                    NodeKind::Name("a".to_string()),
                    NodeKind::Name("b".to_string()),
                    NodeKind::Name("c".to_string()),
                ]
            );
            assert_eq!(ops, vec![CmpOp::Lt, CmpOp::LtE]);
        }
        other => panic!("expected comparison, got {other:?}"),
    }
}

#[test]
fn test_fstring_parts() {
    match expr("f\"a{b!r}c\"") {
        NodeKind::FormattedString(parts) => {
            assert_eq!(parts.len(), 3);
            assert_eq!(parts[0].kind, NodeKind::Literal(Literal::Str("a".to_string())));
            match &parts[1].kind {
                NodeKind::FormattedValue {
                    value,
                    conversion,
                    format_spec,
                } => {
                    assert_eq!(value.kind, NodeKind::Name("b".to_string()));
                    assert_eq!(*conversion, Some('r'));
                    assert!(format_spec.is_none());
                }
                other => panic!("expected formatted value, got {other:?}"),
            }
            assert_eq!(parts[2].kind, NodeKind::Literal(Literal::Str("c".to_string())));
        }
        other => panic!("expected f-string, got {other:?}"),
    }
}

#[test]
fn test_fstring_text_parts_span_their_own_pieces() {
    let NodeKind::FormattedString(parts) = expr("'a' f'{b}' 'c'") else {
        panic!("expected f-string");
    };
    assert_eq!(parts.len(), 3);
    assert_eq!((parts[0].start, parts[0].end), (0, 3));
    assert_eq!((parts[2].start, parts[2].end), (11, 14));
}

#[test]
fn test_fstring_field_reads_are_recorded() {
    let sst = parse_module("f'{value}'\n").unwrap();
    assert!(sst.scopes.get(sst.root_scope).seen.contains("value"));
}

#[test]
fn test_adjacent_strings_concatenate() {
    assert_eq!(expr("'a' \"b\""), NodeKind::Literal(Literal::Str("ab".to_string())));
    assert_eq!(error("b'a' 'b'\n").message, "cannot mix bytes and nonbytes literals");
}

// ── nesting limits ───────────────────────────────────────────────────────────

fn nested_parens(levels: usize) -> String {
    format!("x = {}1{}\n", "(".repeat(levels), ")".repeat(levels))
}

#[test]
fn test_two_hundred_nested_parentheses_parse() {
    assert!(parse_module(&nested_parens(200)).is_ok());
    let calls = format!("{}0{}\n", "f(".repeat(200), ")".repeat(200));
    assert!(parse_module(&calls).is_ok());
}

#[test]
fn test_deep_parentheses_are_a_syntax_error() {
    let err = error(&nested_parens(5000));
    assert_eq!(err.kind, ErrorKind::Grammar);
    assert_eq!(err.message, "too many nested parentheses");
    assert_eq!((err.line, err.column), (1, 205));

    let err = error(&format!("{}]\n", "[".repeat(201)));
    assert_eq!(err.message, "too many nested parentheses");
}

#[test]
fn test_deep_unary_chain_is_a_syntax_error() {
    assert!(parse_module(&format!("{}1\n", "-".repeat(500))).is_ok());
    let err = error(&format!("{}1\n", "-".repeat(5000)));
    assert_eq!(err.kind, ErrorKind::Grammar);
    assert_eq!(err.message, "expression too deeply nested");
}

#[test]
fn test_deep_blocks_are_an_indentation_error() {
    let mut src = String::new();
    for level in 0..120 {
        src.push_str(&" ".repeat(level));
        src.push_str("if x:\n");
    }
    src.push_str(&" ".repeat(120));
    src.push_str("pass\n");
    let err = error(&src);
    assert_eq!(err.kind, ErrorKind::Indentation);
    assert_eq!(err.message, "too many levels of indentation");
}

// ── parameters and arguments ─────────────────────────────────────────────────

#[test]
fn test_non_default_after_default_points_at_parameter() {
    let src = "def f(a, b=1, c):\n    pass\n";
    let err = error(src);
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert_eq!(err.message, "non-default argument follows default argument");
    assert_eq!((err.line, err.column), (1, 15));
    assert_eq!(slice_chars(src, err.start, err.end), "c");
}

#[test]
fn test_duplicate_parameter() {
    let err = error("def f(x, x):\n    pass\n");
    assert_eq!(err.message, "duplicate argument 'x' in function definition");
}

#[test]
fn test_call_argument_ordering() {
    assert_eq!(error("f(a=1, b)\n").message, "positional argument follows keyword argument");
    assert_eq!(
        error("f(**k, *a)\n").message,
        "iterable argument unpacking follows keyword argument unpacking"
    );
    assert_eq!(error("f(a=1, a=2)\n").message, "keyword argument repeated: a");
    assert!(parse_module("f(*a, b, c=1, **k)\n").is_ok());
}

// ── loops ────────────────────────────────────────────────────────────────────

#[test]
fn test_break_outside_loop() {
    let err = error("def f():\n  break");
    assert_eq!(err.message, "'break' outside loop");

    let err = error("while True:\n  def g():\n    break");
    assert_eq!(err.message, "'break' outside loop");
}

#[test]
fn test_continue_outside_loop() {
    let err = error("continue\n");
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert_eq!(err.message, "'continue' not properly in loop");
}

#[test]
fn test_loop_flags() {
    let sst = parse_module("for x in y:\n    if x:\n        break\nelse:\n    pass\n").unwrap();
    match &body(&sst)[0].kind {
        NodeKind::For { flags, orelse, .. } => {
            assert_eq!(
                *flags,
                LoopFlags {
                    contains_break: true,
                    contains_continue: false,
                }
            );
            assert_eq!(orelse.len(), 1);
        }
        other => panic!("expected for loop, got {other:?}"),
    }

    let sst = parse_module("while a:\n    while b:\n        continue\n").unwrap();
    match &body(&sst)[0].kind {
        NodeKind::While { flags, .. } => assert_eq!(*flags, LoopFlags::default()),
        other => panic!("expected while loop, got {other:?}"),
    }
}

// ── scopes ───────────────────────────────────────────────────────────────────

#[test]
fn test_first_iterable_belongs_to_enclosing_scope() {
    let sst = parse_module("[x for x in items if x]\n").unwrap();
    let module = sst.scopes.get(sst.root_scope);
    assert!(module.seen.contains("items"));
    assert!(!module.seen.contains("x"));

    let NodeKind::Expr(value) = &body(&sst)[0].kind else {
        panic!("expected expression statement");
    };
    let NodeKind::Comprehension(comp) = &value.kind else {
        panic!("expected comprehension");
    };
    assert_eq!(comp.kind, ComprehensionKind::List);
    let inner = sst.scopes.get(comp.scope);
    assert!(inner.declares("x"));
    assert!(inner.seen.contains("x"));
    assert_eq!(inner.parent, Some(sst.root_scope));
}

#[test]
fn test_comprehension_records_reads_the_enclosing_scope_already_made() {
    let sst = parse_module("def f(b):\n    x\n    return [x for a in b]\n").unwrap();
    let NodeKind::FunctionDef(def) = &body(&sst)[0].kind else {
        panic!("expected function");
    };
    let comp = sst
        .scopes
        .children(def.scope)
        .map(|id| sst.scopes.get(id))
        .find(|scope| scope.id == "<listcomp>")
        .expect("listcomp scope");
    assert!(comp.seen.contains("x"));
    assert!(comp.seen.contains("a"));
    assert!(sst.scopes.get(def.scope).seen.contains("x"));
}

#[test]
fn test_function_scope_records_params_and_locals() {
    let sst = parse_module("def f(a, /, b, *, c):\n    d = a\n").unwrap();
    let NodeKind::FunctionDef(def) = &body(&sst)[0].kind else {
        panic!("expected function");
    };
    let scope = sst.scopes.get(def.scope);
    assert_eq!(scope.params, vec!["a", "b", "c"]);
    assert!(scope.positional_only_marked);
    assert!(scope.declares("d"));
    assert!(sst.scopes.get(sst.root_scope).declares("f"));
}

#[test]
fn test_global_after_use_is_rejected() {
    let err = error("def f():\n    print(x)\n    global x\n");
    assert_eq!(err.message, "name 'x' is used prior to global declaration");

    let err = error("def f(x):\n    global x\n");
    assert_eq!(err.message, "name 'x' is parameter and global");
}

#[test]
fn test_walrus_in_comprehension_binds_outside() {
    let sst = parse_module("[y := v for v in data]\n").unwrap();
    assert!(sst.scopes.get(sst.root_scope).declares("y"));

    let err = error("class C:\n    [y := v for v in data]\n");
    assert_eq!(
        err.message,
        "assignment expression within a comprehension cannot be used in a class body"
    );
}

// ── targets ──────────────────────────────────────────────────────────────────

#[test]
fn test_invalid_assignment_targets() {
    assert_eq!(error("f() = 1\n").message, "cannot assign to function call");
    assert_eq!(error("a, *b, *c = d\n").message, "multiple starred expressions in assignment");
    assert_eq!(error("x + 1 += 2\n").kind, ErrorKind::Semantic);
    assert!(parse_module("a, *b = c\n").is_ok());
}

#[test]
fn test_errors_discard_partial_trees_and_next_parse_is_clean() {
    assert!(parse_module("def f(:\n").is_err());
    let sst = parse_module("def f():\n    return 1\n").unwrap();
    assert_eq!(body(&sst).len(), 1);
}
