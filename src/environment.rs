use crate::source::Span;
use crate::types::{Node, PrimitiveFunc};
use std::collections::{HashMap, HashSet};
use tracing::debug;

// --- Environment Definition ---

/// One frame of the lexical scope chain.
///
/// The outer frame is borrowed, not owned: an enclosed frame can never
/// outlive the frame it extends, and is dropped when the scope that created
/// it exits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Environment<'a> {
    outer: Option<&'a Environment<'a>>,
    bindings: HashMap<String, Node>, // Maps symbol names to values
}

impl Environment<'static> {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Self {
        Environment {
            outer: None,
            bindings: HashMap::new(),
        }
    }

    /// The root frame with the builtin procedures installed.
    pub fn new_global_populated() -> Self {
        let mut env = Environment::new();
        env.add_primitive("+", crate::primitives::prim_add);
        env.add_primitive("-", crate::primitives::prim_sub);
        env.add_primitive("*", crate::primitives::prim_mul);
        env.add_primitive("/", crate::primitives::prim_div);
        env
    }
}

impl<'a> Environment<'a> {
    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer: &'a Environment<'a>) -> Self {
        Environment {
            outer: Some(outer),
            bindings: HashMap::new(),
        }
    }

    /// Runs `body` with a fresh frame enclosed in this one. The frame is
    /// released when `body` returns, whatever it returns.
    pub fn with_enclosed<R>(&self, body: impl FnOnce(&mut Environment<'_>) -> R) -> R {
        let mut scope = Environment::new_enclosed(self);
        debug!(depth = scope.depth(), "entering scope");
        let result = body(&mut scope);
        debug!(depth = scope.depth(), "leaving scope");
        result
    }

    /// Binds `name` in *this* frame, replacing any existing binding here.
    /// Outer frames are never touched.
    pub fn set(&mut self, name: impl Into<String>, value: Node) {
        self.bindings.insert(name.into(), value);
    }

    /// Returns the innermost frame that binds `name`.
    pub fn find(&self, name: &str) -> Option<&Environment<'a>> {
        if self.bindings.contains_key(name) {
            Some(self)
        } else {
            self.outer.and_then(|outer| outer.find(name))
        }
    }

    /// Looks up a symbol's value, walking outward from this frame.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.find(name).and_then(|frame| frame.bindings.get(name))
    }

    /// Number of frames between this one and the root (the root is 0).
    pub fn depth(&self) -> usize {
        self.outer.map_or(0, |outer| outer.depth() + 1)
    }

    /// Helper to add a primitive procedure to the environment.
    fn add_primitive(&mut self, name: &str, func: PrimitiveFunc) {
        let node = Node::new_primitive(func, name, Span::default());
        self.set(name, node);
    }

    /// Gets all identifiers visible from this frame
    pub fn identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer) = self.outer {
            identifiers.extend(outer.identifiers());
        }
        identifiers
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sexpr;

    // Helper to create a dummy node with default span
    fn num_node(n: i64) -> Node {
        Node::new_number(n, Span::default())
    }

    #[test]
    fn test_set_and_get_global() {
        let mut env = Environment::new();
        env.set("x", num_node(10));
        assert_eq!(env.get("x"), Some(&num_node(10)));
    }

    #[test]
    fn test_get_unbound() {
        let env = Environment::new();
        assert_eq!(env.get("y"), None);
        assert!(env.find("y").is_none());
    }

    #[test]
    fn test_set_overwrites_in_same_frame() {
        let mut env = Environment::new();
        env.set("x", num_node(1));
        env.set("x", num_node(2));
        assert_eq!(env.get("x"), Some(&num_node(2)));
    }

    #[test]
    fn test_get_through_enclosed() {
        let mut global = Environment::new();
        global.set("x", num_node(10));

        let mut local = Environment::new_enclosed(&global);
        local.set("y", num_node(20));

        assert_eq!(local.get("y"), Some(&num_node(20)));
        assert_eq!(local.get("x"), Some(&num_node(10)));
        assert_eq!(global.get("y"), None);
    }

    #[test]
    fn test_find_returns_owning_frame() {
        let mut global = Environment::new();
        global.set("x", num_node(10));
        let mut local = Environment::new_enclosed(&global);
        local.set("y", num_node(20));

        assert_eq!(local.find("x").map(Environment::depth), Some(0));
        assert_eq!(local.find("y").map(Environment::depth), Some(1));
    }

    #[test]
    fn test_shadowing() {
        let mut global = Environment::new();
        global.set("x", num_node(10));

        let mut local = Environment::new_enclosed(&global);
        local.set("x", num_node(50)); // Shadow global x

        let mut inner = Environment::new_enclosed(&local);
        inner.set("y", num_node(1));

        assert_eq!(inner.get("x"), Some(&num_node(50)));
        assert_eq!(local.get("x"), Some(&num_node(50)));
        assert_eq!(global.get("x"), Some(&num_node(10)));
        assert_eq!(inner.depth(), 2);
    }

    #[test]
    fn test_with_enclosed_releases_frame() {
        let mut global = Environment::new();
        global.set("x", num_node(1));

        let seen = global.with_enclosed(|scope| {
            scope.set("tmp", num_node(2));
            assert_eq!(scope.depth(), 1);
            scope.get("tmp").cloned()
        });
        assert_eq!(seen, Some(num_node(2)));
        assert_eq!(global.get("tmp"), None);

        // Errors leave no trace either
        let failed: Result<(), &str> = global.with_enclosed(|scope| {
            scope.set("tmp", num_node(3));
            Err("boom")
        });
        assert!(failed.is_err());
        assert_eq!(global.get("tmp"), None);
    }

    #[test]
    fn test_sibling_scopes_are_independent() {
        let global = Environment::new();
        let mut first = Environment::new_enclosed(&global);
        first.set("x", num_node(10));
        let second = Environment::new_enclosed(&global);

        assert_eq!(first.get("x"), Some(&num_node(10)));
        assert_eq!(second.get("x"), None);
    }

    #[test]
    fn test_global_populated_has_builtins() {
        let env = Environment::new_global_populated();
        for name in ["+", "-", "*", "/"] {
            match env.get(name).map(|node| &node.kind) {
                Some(Sexpr::Func(procedure)) => assert_eq!(procedure.name(), name),
                other => panic!("Expected builtin '{}', got {:?}", name, other),
            }
        }
        let identifiers = env.identifiers();
        assert_eq!(identifiers.len(), 4);
        assert!(identifiers.contains("/"));
    }
}
