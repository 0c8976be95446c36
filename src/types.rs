use crate::{evaluator::EvalResult, source::Span};
use std::fmt; // For custom display formatting

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Sexpr, // The actual S-expression data
    pub span: Span,  // The source span it covers
}

impl Node {
    pub fn new(kind: Sexpr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_root(span: Span) -> Self {
        Node::new(Sexpr::Root(Vec::new()), span)
    }

    pub fn new_list(children: Vec<Node>, span: Span) -> Self {
        Node::new(Sexpr::List(children), span)
    }

    pub fn new_vector(children: Vec<Node>, span: Span) -> Self {
        Node::new(Sexpr::Vector(children), span)
    }

    pub fn new_hashmap(children: Vec<Node>, span: Span) -> Self {
        Node::new(Sexpr::Hashmap(children), span)
    }

    pub fn new_symbol(name: impl Into<String>, span: Span) -> Self {
        Node::new(Sexpr::Symbol(name.into()), span)
    }

    pub fn new_string(value: impl Into<String>, span: Span) -> Self {
        Node::new(Sexpr::String(value.into()), span)
    }

    pub fn new_number(value: i64, span: Span) -> Self {
        Node::new(Sexpr::Number(value), span)
    }

    pub fn new_bool(value: bool, span: Span) -> Self {
        Node::new(Sexpr::Bool(value), span)
    }

    pub fn new_nil(span: Span) -> Self {
        Node::new(Sexpr::Nil, span)
    }

    pub fn new_primitive(func: PrimitiveFunc, name: &str, span: Span) -> Self {
        Node::new(
            Sexpr::Func(Procedure::Primitive(func, name.to_string())),
            span,
        )
    }

    pub fn node_kind(&self) -> NodeKind {
        self.kind.node_kind()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate to Sexpr's Display implementation
        write!(f, "{}", self.kind)
    }
}

/// The tag of a `Sexpr`, without its payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    List,
    Vector,
    Hashmap,
    Symbol,
    String,
    Nil,
    Number,
    Bool,
    Func,
}

impl NodeKind {
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            NodeKind::Root | NodeKind::List | NodeKind::Vector | NodeKind::Hashmap
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Root => "root",
            NodeKind::List => "list",
            NodeKind::Vector => "vector",
            NodeKind::Hashmap => "hashmap",
            NodeKind::Symbol => "symbol",
            NodeKind::String => "string",
            NodeKind::Nil => "nil",
            NodeKind::Number => "number",
            NodeKind::Bool => "bool",
            NodeKind::Func => "function",
        };
        write!(f, "{}", name)
    }
}

/// A node's payload. Code and data share this representation; payloads are
/// only reachable through a match on the variant, or through the accessors
/// below which return `None` for the wrong kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    Root(Vec<Node>),    // Reader output, 0 or 1 child
    List(Vec<Node>),    // (a b c)
    Vector(Vec<Node>),  // [a b c]
    Hashmap(Vec<Node>), // {a b c}
    Symbol(String),     // e.g., +, def!, variable-name
    String(String),     // Unescaped contents of "..."
    Nil,
    Number(i64),
    Bool(bool),
    Func(Procedure),
}

impl Sexpr {
    pub fn node_kind(&self) -> NodeKind {
        match self {
            Sexpr::Root(_) => NodeKind::Root,
            Sexpr::List(_) => NodeKind::List,
            Sexpr::Vector(_) => NodeKind::Vector,
            Sexpr::Hashmap(_) => NodeKind::Hashmap,
            Sexpr::Symbol(_) => NodeKind::Symbol,
            Sexpr::String(_) => NodeKind::String,
            Sexpr::Nil => NodeKind::Nil,
            Sexpr::Number(_) => NodeKind::Number,
            Sexpr::Bool(_) => NodeKind::Bool,
            Sexpr::Func(_) => NodeKind::Func,
        }
    }

    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Sexpr::Root(children)
            | Sexpr::List(children)
            | Sexpr::Vector(children)
            | Sexpr::Hashmap(children) => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Sexpr::Root(children)
            | Sexpr::List(children)
            | Sexpr::Vector(children)
            | Sexpr::Hashmap(children) => Some(children),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Sexpr::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Sexpr::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Sexpr::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Sexpr::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&Procedure> {
        match self {
            Sexpr::Func(procedure) => Some(procedure),
            _ => None,
        }
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Sexpr::Nil | Sexpr::Bool(false))
    }
}

fn write_children(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    children: &[Node],
    close: &str,
) -> fmt::Result {
    write!(f, "{}", open)?;
    let mut first = true;
    for child in children {
        if !first {
            write!(f, " ")?;
        }
        write!(f, "{}", child)?;
        first = false;
    }
    write!(f, "{}", close)
}

// Renders the value back to surface syntax
impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Root(children) => match children.first() {
                Some(child) => write!(f, "{}", child),
                None => Ok(()),
            },
            Sexpr::List(children) => write_children(f, "(", children, ")"),
            Sexpr::Vector(children) => write_children(f, "[", children, "]"),
            Sexpr::Hashmap(children) => write_children(f, "{", children, "}"),
            Sexpr::Symbol(s) => write!(f, "{}", s),
            Sexpr::Number(n) => write!(f, "{}", n),
            Sexpr::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Sexpr::Nil => write!(f, "nil"),
            Sexpr::String(str) => {
                write!(
                    f,
                    "\"{}\"",
                    str.chars().fold(String::new(), |mut acc, char| {
                        match char {
                            '"' => acc.push_str("\\\""),
                            '\\' => acc.push_str("\\\\"),
                            '\n' => acc.push_str("\\n"),
                            '\r' => acc.push_str("\\r"),
                            '\t' => acc.push_str("\\t"),
                            c => acc.push(c),
                        }
                        acc
                    })
                )
            }
            Sexpr::Func(procedure) => write!(f, "#<function {}>", procedure.name()),
        }
    }
}

pub type PrimitiveFunc = fn(Vec<Node>, Span) -> EvalResult;

/// Anything that can be applied to a list of already-evaluated arguments.
#[derive(Clone)] // Need Clone for Sexpr::Func
pub enum Procedure {
    Primitive(PrimitiveFunc, String), // The function pointer and its name (for display/debug)
}

impl Procedure {
    pub fn name(&self) -> &str {
        match self {
            Procedure::Primitive(_, name) => name,
        }
    }

    /// Invokes the procedure. `span` is the span of the whole call form and
    /// is used for any error the procedure reports.
    pub fn apply(&self, args: Vec<Node>, span: Span) -> EvalResult {
        match self {
            Procedure::Primitive(func, _) => func(args, span),
        }
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Primitive(_, name) => write!(f, "Primitive({})", name),
        }
    }
}

// Function pointers are not reliably comparable, so primitives compare by name.
impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Procedure::Primitive(_, n1), Procedure::Primitive(_, n2)) => n1 == n2,
        }
    }
}
