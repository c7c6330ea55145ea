//! Lexical scope tracking.
//!
//! Scopes live in an append-only arena ([`Scopes`]) and refer to their parent
//! by [`ScopeId`], so the finished tree can hold ids without borrowing.
//! [`ScopeEnvironment`] is the parse-time view: a stack of active scopes over
//! the arena, plus the bookkeeping operations the builder calls as it sees
//! bindings and uses.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeKind {
    Module,
    Function,
    Class,
    Lambda,
    ListComp,
    SetComp,
    DictComp,
    GenExp,
}

impl ScopeKind {
    pub fn is_comprehension(self) -> bool {
        matches!(
            self,
            ScopeKind::ListComp | ScopeKind::SetComp | ScopeKind::DictComp | ScopeKind::GenExp
        )
    }

    /// Scopes whose body may `return` / `yield`.
    pub fn is_function(self) -> bool {
        matches!(self, ScopeKind::Function | ScopeKind::Lambda)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub id: String,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Parameter names in declaration order (also present in `declared`).
    pub params: Vec<String>,
    /// Names bound in this scope.
    pub declared: BTreeSet<String>,
    /// Names read in this scope.
    pub seen: BTreeSet<String>,
    pub globals: BTreeSet<String>,
    pub nonlocals: BTreeSet<String>,
    pub has_annotations: bool,
    /// The parameter list contained a `/` marker.
    pub positional_only_marked: bool,
    /// The body contains `yield` or `yield from`.
    pub is_generator: bool,
    /// Names were pre-populated from a caller-supplied frame.
    pub captured_frame: bool,
}

impl Scope {
    fn new(id: String, kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            kind,
            parent,
            params: Vec::new(),
            declared: BTreeSet::new(),
            seen: BTreeSet::new(),
            globals: BTreeSet::new(),
            nonlocals: BTreeSet::new(),
            has_annotations: false,
            positional_only_marked: false,
            is_generator: false,
            captured_frame: false,
        }
    }

    pub fn declares(&self, name: &str) -> bool {
        self.declared.contains(name)
    }
}

/// Names visible in an enclosing runtime frame, supplied to inline
/// evaluation so references to them can be classified as frame locals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexicalFrame {
    pub names: Vec<String>,
}

impl LexicalFrame {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Arena ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(i, s)| (ScopeId(i as u32), s))
    }

    pub fn children(&self, parent: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        self.iter()
            .filter(move |(_, s)| s.parent == Some(parent))
            .map(|(id, _)| id)
    }

    fn push(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    fn root_of(&self, mut id: ScopeId) -> ScopeId {
        while let Some(parent) = self.get(id).parent {
            id = parent;
        }
        id
    }

    /// The scope a read of `name` in scope `from` binds to, following
    /// `global` / `nonlocal` declarations. Class bodies are only visible to
    /// their own statements, not to scopes nested inside them. `None` means
    /// the name is a module global that was never bound, or a builtin.
    pub fn resolve(&self, from: ScopeId, name: &str) -> Option<ScopeId> {
        let start = self.get(from);
        if start.globals.contains(name) {
            let root = self.root_of(from);
            return self.get(root).declares(name).then_some(root);
        }
        if !start.nonlocals.contains(name) && start.declares(name) {
            return Some(from);
        }
        let mut cursor = start.parent;
        while let Some(id) = cursor {
            let scope = self.get(id);
            let visible = scope.kind != ScopeKind::Class;
            if visible && scope.globals.contains(name) {
                let root = self.root_of(id);
                return self.get(root).declares(name).then_some(root);
            }
            if visible && !scope.nonlocals.contains(name) && scope.declares(name) {
                return Some(id);
            }
            cursor = scope.parent;
        }
        None
    }

    /// Every name read anywhere in the arena that resolves to `target`.
    pub fn free_names_resolving_to(&self, target: ScopeId) -> Vec<String> {
        let mut names = BTreeSet::new();
        for (id, scope) in self.iter() {
            for name in &scope.seen {
                if self.resolve(id, name) == Some(target) {
                    names.insert(name.clone());
                }
            }
        }
        names.into_iter().collect()
    }
}

// ── Environment ───────────────────────────────────────────────────────────────

/// A position in the environment's history, taken before parsing something
/// whose scope is only known afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMark {
    scopes: usize,
    seen: usize,
    walrus: usize,
}

#[derive(Debug, Clone)]
struct SeenEntry {
    scope: ScopeId,
    name: String,
    /// This read put the name into the scope's `seen` set.
    first: bool,
}

#[derive(Debug, Clone)]
pub struct ScopeEnvironment {
    scopes: Scopes,
    stack: Vec<ScopeId>,
    root: ScopeId,
    /// Every read, in order, so reads can be moved to a scope that is
    /// opened after they were parsed.
    seen_log: Vec<SeenEntry>,
    /// Kind of the scope that received each assignment-expression binding.
    walrus_log: Vec<ScopeKind>,
}

impl ScopeEnvironment {
    pub fn new(root_id: &str, kind: ScopeKind) -> Self {
        let mut scopes = Scopes::default();
        let root = scopes.push(Scope::new(root_id.to_string(), kind, None));
        Self {
            scopes,
            stack: vec![root],
            root,
            seen_log: Vec::new(),
            walrus_log: Vec::new(),
        }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(self.root)
    }

    pub fn current_scope(&self) -> &Scope {
        self.scopes.get(self.current())
    }

    fn current_mut(&mut self) -> &mut Scope {
        let id = self.current();
        self.scopes.get_mut(id)
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn into_scopes(self) -> Scopes {
        self.scopes
    }

    /// Open a new scope nested in the current one and make it current.
    pub fn push_scope(&mut self, id: impl Into<String>, kind: ScopeKind) -> ScopeId {
        let parent = self.current();
        let scope = self.scopes.push(Scope::new(id.into(), kind, Some(parent)));
        trace!(scope = scope.index(), ?kind, depth = self.stack.len(), "push scope");
        self.stack.push(scope);
        scope
    }

    /// Open a scope whose bindings come from a caller-supplied frame.
    pub fn push_captured(
        &mut self,
        id: impl Into<String>,
        kind: ScopeKind,
        frame: &LexicalFrame,
    ) -> ScopeId {
        let scope = self.push_scope(id, kind);
        let current = self.current_mut();
        current.captured_frame = true;
        current.declared.extend(frame.names.iter().cloned());
        scope
    }

    /// Make the previous scope current again. The root is never popped.
    pub fn pop_scope(&mut self) -> Option<ScopeId> {
        if self.stack.len() <= 1 {
            return None;
        }
        let popped = self.stack.pop();
        trace!(scope = ?popped.map(ScopeId::index), "pop scope");
        popped
    }

    /// Temporarily make the parent of the current scope current; undone by
    /// [`Self::pop_scope`]. Returns `false` at the root.
    pub fn reenter_parent(&mut self) -> bool {
        match self.current_scope().parent {
            Some(parent) => {
                self.stack.push(parent);
                true
            }
            None => false,
        }
    }

    /// Record a binding of `name` in the current scope.
    pub fn create_local(&mut self, name: &str) {
        let scope = self.current_mut();
        if !scope.declared.contains(name) {
            scope.declared.insert(name.to_string());
        }
    }

    pub fn create_param(&mut self, name: &str) {
        let scope = self.current_mut();
        scope.params.push(name.to_string());
        scope.declared.insert(name.to_string());
    }

    /// Record a read of `name` in the current scope.
    pub fn add_seen_var(&mut self, name: &str) {
        let id = self.current();
        let first = self.scopes.get_mut(id).seen.insert(name.to_string());
        self.seen_log.push(SeenEntry {
            scope: id,
            name: name.to_string(),
            first,
        });
    }

    /// Bind the target of an assignment expression. Inside comprehensions the
    /// binding goes to the nearest enclosing scope that is not one. Returns
    /// the kind of scope that received the binding.
    pub fn create_walrus_local(&mut self, name: &str) -> ScopeKind {
        let mut id = self.current();
        while self.scopes.get(id).kind.is_comprehension() {
            match self.scopes.get(id).parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
        let scope = self.scopes.get_mut(id);
        scope.declared.insert(name.to_string());
        let kind = scope.kind;
        self.walrus_log.push(kind);
        kind
    }

    /// Whether an assignment expression parsed since `mark` bound its target
    /// in a class body.
    pub fn walrus_in_class_since(&self, mark: EnvMark) -> bool {
        self.walrus_log
            .get(mark.walrus..)
            .is_some_and(|kinds| kinds.contains(&ScopeKind::Class))
    }

    pub fn register_global(&mut self, name: &str) {
        self.current_mut().globals.insert(name.to_string());
    }

    pub fn register_nonlocal(&mut self, name: &str) {
        self.current_mut().nonlocals.insert(name.to_string());
    }

    pub fn set_has_annotations(&mut self) {
        self.current_mut().has_annotations = true;
    }

    pub fn mark_positional_only(&mut self) {
        self.current_mut().positional_only_marked = true;
    }

    pub fn mark_generator(&mut self) {
        self.current_mut().is_generator = true;
    }

    pub fn mark(&self) -> EnvMark {
        EnvMark {
            scopes: self.scopes.len(),
            seen: self.seen_log.len(),
            walrus: self.walrus_log.len(),
        }
    }

    /// Forget reads recorded since `mark`; used when a name turns out to be
    /// a keyword argument rather than a reference. Names the scope had
    /// already read before the mark stay seen.
    pub fn discard_seen_since(&mut self, mark: EnvMark) {
        let from = mark.seen.min(self.seen_log.len());
        for entry in self.seen_log.split_off(from) {
            if entry.first {
                self.scopes.get_mut(entry.scope).seen.remove(&entry.name);
            }
        }
    }

    /// Move everything recorded in scope `from` since `mark` into scope
    /// `to`: reads, and scopes opened directly under `from`. A read leaves
    /// `from` only if `from` had not seen the name before the mark.
    /// Used when a comprehension's element was parsed before its `for`
    /// revealed that it belongs to a new scope.
    pub fn relocate_since(&mut self, mark: EnvMark, from: ScopeId, to: ScopeId) {
        let start = mark.seen.min(self.seen_log.len());
        for index in start..self.seen_log.len() {
            let entry = &self.seen_log[index];
            if entry.scope != from {
                continue;
            }
            let name = entry.name.clone();
            if entry.first {
                self.scopes.get_mut(from).seen.remove(&name);
            }
            let first = self.scopes.get_mut(to).seen.insert(name);
            let entry = &mut self.seen_log[index];
            entry.scope = to;
            entry.first = first;
        }
        for index in mark.scopes..self.scopes.len() {
            let id = ScopeId(index as u32);
            if id != to && self.scopes.get(id).parent == Some(from) {
                self.scopes.get_mut(id).parent = Some(to);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_restores_current() {
        let mut env = ScopeEnvironment::new("<module>", ScopeKind::Module);
        let root = env.current();
        let f = env.push_scope("f", ScopeKind::Function);
        assert_eq!(env.current(), f);
        assert_eq!(env.scopes().get(f).parent, Some(root));
        assert_eq!(env.pop_scope(), Some(f));
        assert_eq!(env.current(), root);
        assert_eq!(env.pop_scope(), None);
    }

    #[test]
    fn test_reenter_parent() {
        let mut env = ScopeEnvironment::new("<module>", ScopeKind::Module);
        let root = env.current();
        env.push_scope("<listcomp>", ScopeKind::ListComp);
        assert!(env.reenter_parent());
        assert_eq!(env.current(), root);
        env.pop_scope();
        assert_eq!(env.current_scope().kind, ScopeKind::ListComp);
    }

    #[test]
    fn test_walrus_skips_comprehensions() {
        let mut env = ScopeEnvironment::new("<module>", ScopeKind::Module);
        let f = env.push_scope("f", ScopeKind::Function);
        env.push_scope("<listcomp>", ScopeKind::ListComp);
        assert_eq!(env.create_walrus_local("y"), ScopeKind::Function);
        assert!(env.scopes().get(f).declares("y"));
        assert!(!env.current_scope().declares("y"));
    }

    #[test]
    fn test_resolve_skips_class_bodies() {
        let mut env = ScopeEnvironment::new("<module>", ScopeKind::Module);
        env.create_local("x");
        let c = env.push_scope("C", ScopeKind::Class);
        env.create_local("x");
        let m = env.push_scope("m", ScopeKind::Function);
        let scopes = env.scopes();
        assert_eq!(scopes.resolve(m, "x"), Some(scopes.root_of(m)));
        assert_eq!(scopes.resolve(c, "x"), Some(c));
        assert_eq!(scopes.resolve(m, "len"), None);
    }

    #[test]
    fn test_relocate_moves_reads_and_child_scopes() {
        let mut env = ScopeEnvironment::new("<module>", ScopeKind::Module);
        let root = env.current();
        env.add_seen_var("before");
        let mark = env.mark();
        env.add_seen_var("x");
        env.add_seen_var("before");
        let lambda = env.push_scope("<lambda>", ScopeKind::Lambda);
        env.pop_scope();
        let comp = env.push_scope("<listcomp>", ScopeKind::ListComp);
        env.relocate_since(mark, root, comp);
        let scopes = env.scopes();
        assert!(scopes.get(comp).seen.contains("x"));
        assert!(!scopes.get(root).seen.contains("x"));
        assert!(scopes.get(root).seen.contains("before"));
        assert!(scopes.get(comp).seen.contains("before"));
        assert_eq!(scopes.get(lambda).parent, Some(comp));
        assert_eq!(scopes.get(comp).parent, Some(root));
    }

    #[test]
    fn test_discard_keeps_reads_from_before_the_mark() {
        let mut env = ScopeEnvironment::new("<module>", ScopeKind::Module);
        env.add_seen_var("k");
        let mark = env.mark();
        env.add_seen_var("k");
        env.add_seen_var("fresh");
        env.discard_seen_since(mark);
        assert!(env.current_scope().seen.contains("k"));
        assert!(!env.current_scope().seen.contains("fresh"));
    }

    #[test]
    fn test_captured_frame_names() {
        let mut env = ScopeEnvironment::new("<module>", ScopeKind::Module);
        let frame = LexicalFrame::new(["a", "b"]);
        let id = env.push_captured("<frame>", ScopeKind::Function, &frame);
        env.add_seen_var("a");
        env.add_seen_var("zzz");
        assert!(env.current_scope().captured_frame);
        assert_eq!(env.scopes().free_names_resolving_to(id), vec!["a".to_string()]);
    }
}
