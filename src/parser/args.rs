//! Builders that accumulate parameter and call-argument lists and enforce
//! Python's ordering rules as items arrive.
//!
//! Both builders report violations as plain messages; the parser attaches
//! the position of the offending item.

use std::collections::HashSet;

use crate::sst::{Keyword, Node, Param, Parameters};

// ── Parameter definitions ─────────────────────────────────────────────────────

/// Collects the parameters of a `def` or `lambda` in source order.
#[derive(Debug, Default)]
pub struct ArgDefListBuilder {
    params: Parameters,
    names: HashSet<String>,
    seen_default: bool,
    seen_slash: bool,
    seen_star: bool,
    bare_star: bool,
}

const AFTER_KWARG: &str = "arguments cannot follow var-keyword argument";

impl ArgDefListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&mut self, name: &str) -> Result<(), String> {
        if !self.names.insert(name.to_string()) {
            return Err(format!("duplicate argument '{name}' in function definition"));
        }
        Ok(())
    }

    /// A plain parameter: positional before `*`, keyword-only after it.
    pub fn add_param(&mut self, param: Param) -> Result<(), String> {
        if self.params.kwarg.is_some() {
            return Err(AFTER_KWARG.to_string());
        }
        self.claim(&param.name)?;
        if self.seen_star {
            self.params.kwonly.push(param);
            return Ok(());
        }
        if param.default.is_some() {
            self.seen_default = true;
        } else if self.seen_default {
            return Err("non-default argument follows default argument".to_string());
        }
        self.params.args.push(param);
        Ok(())
    }

    /// The `/` marker: everything collected so far becomes positional-only.
    pub fn mark_positional_only(&mut self) -> Result<(), String> {
        if self.params.kwarg.is_some() {
            return Err(AFTER_KWARG.to_string());
        }
        if self.seen_star {
            return Err("/ must be ahead of *".to_string());
        }
        if self.seen_slash {
            return Err("/ may appear only once".to_string());
        }
        if self.params.args.is_empty() {
            return Err("at least one argument must precede /".to_string());
        }
        self.seen_slash = true;
        self.params.posonly = std::mem::take(&mut self.params.args);
        Ok(())
    }

    /// `*name`, or a bare `*` when `vararg` is `None`.
    pub fn add_star(&mut self, vararg: Option<Param>) -> Result<(), String> {
        if self.params.kwarg.is_some() {
            return Err(AFTER_KWARG.to_string());
        }
        if self.seen_star {
            return Err("* argument may appear only once".to_string());
        }
        self.seen_star = true;
        match vararg {
            Some(param) => {
                self.claim(&param.name)?;
                self.params.vararg = Some(param);
            }
            None => self.bare_star = true,
        }
        Ok(())
    }

    pub fn add_kwarg(&mut self, param: Param) -> Result<(), String> {
        if self.params.kwarg.is_some() {
            return Err(AFTER_KWARG.to_string());
        }
        self.claim(&param.name)?;
        self.params.kwarg = Some(param);
        Ok(())
    }

    pub fn has_positional_only(&self) -> bool {
        self.seen_slash
    }

    pub fn finish(self) -> Result<Parameters, String> {
        if self.bare_star && self.params.kwonly.is_empty() {
            return Err("named arguments must follow bare *".to_string());
        }
        Ok(self.params)
    }
}

// ── Call arguments ────────────────────────────────────────────────────────────

/// Collects the arguments of a call or a class's base list.
#[derive(Debug, Default)]
pub struct ArgListBuilder {
    args: Vec<Node>,
    keywords: Vec<Keyword>,
    names: HashSet<String>,
    seen_keyword: bool,
    seen_kwargs_unpack: bool,
    naked_generator: bool,
}

impl ArgListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_positional(&mut self, arg: Node) -> Result<(), String> {
        if self.seen_kwargs_unpack {
            return Err("positional argument follows keyword argument unpacking".to_string());
        }
        if self.seen_keyword {
            return Err("positional argument follows keyword argument".to_string());
        }
        self.args.push(arg);
        Ok(())
    }

    /// `*iterable`; `arg` is already wrapped in a starred node.
    pub fn add_starred(&mut self, arg: Node) -> Result<(), String> {
        if self.seen_kwargs_unpack {
            return Err(
                "iterable argument unpacking follows keyword argument unpacking".to_string(),
            );
        }
        self.args.push(arg);
        Ok(())
    }

    /// `name=value`.
    pub fn add_keyword(&mut self, keyword: Keyword) -> Result<(), String> {
        if let Some(name) = &keyword.arg {
            if !self.names.insert(name.clone()) {
                return Err(format!("keyword argument repeated: {name}"));
            }
        }
        self.seen_keyword = true;
        self.keywords.push(keyword);
        Ok(())
    }

    /// `**mapping`.
    pub fn add_kwargs(&mut self, keyword: Keyword) {
        self.seen_kwargs_unpack = true;
        self.keywords.push(keyword);
    }

    /// A generator expression written without its own parentheses, as in
    /// `f(x for x in y)`.
    pub fn add_naked_generator(&mut self, arg: Node) -> Result<(), String> {
        self.naked_generator = true;
        self.add_positional(arg)
    }

    pub fn finish(self) -> Result<(Vec<Node>, Vec<Keyword>), String> {
        if self.naked_generator && self.args.len() + self.keywords.len() > 1 {
            return Err("Generator expression must be parenthesized".to_string());
        }
        Ok((self.args, self.keywords))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sst::{Literal, NodeKind, Number, Span};

    fn param(name: &str, default: bool) -> Param {
        Param {
            name: name.to_string(),
            annotation: None,
            default: default.then(|| int(1)),
            start: 0,
            end: 1,
        }
    }

    fn int(v: i64) -> Node {
        Node::new(NodeKind::Literal(Literal::Number(Number::Int(v))), Span::new(0, 1))
    }

    fn kw(name: Option<&str>) -> Keyword {
        Keyword {
            arg: name.map(str::to_string),
            value: int(1),
            start: 0,
            end: 1,
        }
    }

    #[test]
    fn test_duplicate_parameter() {
        let mut b = ArgDefListBuilder::new();
        b.add_param(param("x", false)).unwrap();
        let err = b.add_param(param("x", false)).unwrap_err();
        assert_eq!(err, "duplicate argument 'x' in function definition");
    }

    #[test]
    fn test_non_default_after_default() {
        let mut b = ArgDefListBuilder::new();
        b.add_param(param("a", true)).unwrap();
        assert_eq!(
            b.add_param(param("b", false)).unwrap_err(),
            "non-default argument follows default argument"
        );
    }

    #[test]
    fn test_kwonly_need_no_defaults() {
        let mut b = ArgDefListBuilder::new();
        b.add_param(param("a", true)).unwrap();
        b.add_star(None).unwrap();
        b.add_param(param("b", false)).unwrap();
        let params = b.finish().unwrap();
        assert_eq!(params.kwonly.len(), 1);
        assert_eq!(params.args.len(), 1);
    }

    #[test]
    fn test_bare_star_needs_named() {
        let mut b = ArgDefListBuilder::new();
        b.add_param(param("a", false)).unwrap();
        b.add_star(None).unwrap();
        assert_eq!(b.finish().unwrap_err(), "named arguments must follow bare *");
    }

    #[test]
    fn test_slash_rules() {
        let mut b = ArgDefListBuilder::new();
        assert_eq!(
            b.mark_positional_only().unwrap_err(),
            "at least one argument must precede /"
        );
        b.add_param(param("a", false)).unwrap();
        b.mark_positional_only().unwrap();
        assert!(b.has_positional_only());
        b.add_param(param("b", false)).unwrap();
        b.add_star(None).unwrap();
        assert_eq!(b.mark_positional_only().unwrap_err(), "/ must be ahead of *");
    }

    #[test]
    fn test_nothing_after_kwarg() {
        let mut b = ArgDefListBuilder::new();
        b.add_kwarg(param("kw", false)).unwrap();
        assert_eq!(b.add_param(param("a", false)).unwrap_err(), AFTER_KWARG);
    }

    #[test]
    fn test_positional_after_keyword() {
        let mut b = ArgListBuilder::new();
        b.add_keyword(kw(Some("a"))).unwrap();
        assert_eq!(
            b.add_positional(int(1)).unwrap_err(),
            "positional argument follows keyword argument"
        );
    }

    #[test]
    fn test_positional_after_kwargs_unpack() {
        let mut b = ArgListBuilder::new();
        b.add_kwargs(kw(None));
        assert_eq!(
            b.add_positional(int(1)).unwrap_err(),
            "positional argument follows keyword argument unpacking"
        );
        assert_eq!(
            b.add_starred(int(1)).unwrap_err(),
            "iterable argument unpacking follows keyword argument unpacking"
        );
    }

    #[test]
    fn test_repeated_keyword() {
        let mut b = ArgListBuilder::new();
        b.add_keyword(kw(Some("a"))).unwrap();
        assert_eq!(
            b.add_keyword(kw(Some("a"))).unwrap_err(),
            "keyword argument repeated: a"
        );
    }

    #[test]
    fn test_naked_generator_must_be_alone() {
        let mut b = ArgListBuilder::new();
        b.add_naked_generator(int(1)).unwrap();
        assert!(b.finish().is_ok());

        let mut b = ArgListBuilder::new();
        b.add_naked_generator(int(1)).unwrap();
        b.add_keyword(kw(Some("key"))).unwrap();
        assert_eq!(
            b.finish().unwrap_err(),
            "Generator expression must be parenthesized"
        );
    }
}
