use crate::environment::Environment;
use crate::parser::parse_str;
use crate::source::Span;
use crate::types::{Node, NodeKind, Procedure, Sexpr};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, trace};

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("'{name}' could not be resolved")]
    Unresolved { name: String, span: Span },
    #[error("'{name}' not found")]
    NotFound { name: String, span: Span },
    #[error("cannot call '{repr}'")]
    NotCallable { repr: String, span: Span },
    #[error("'{form}' expects {expected} operands, got {found}")]
    Arity {
        form: &'static str,
        expected: &'static str,
        found: usize,
        span: Span,
    },
    #[error("'{form}' expects a symbol to bind, got '{repr}'")]
    NotASymbol {
        form: &'static str,
        repr: String,
        span: Span,
    },
    #[error("'let*' expects a list, vector or hashmap of bindings, got '{repr}'")]
    NotABindingList { repr: String, span: Span },
    #[error("'let*' bindings must come in pairs, got {count} forms")]
    OddBindings { count: usize, span: Span },
    #[error("'{repr}' not a number")]
    NotANumber { repr: String, span: Span },
    #[error("division by zero")]
    DivisionByZero { span: Span },
    #[error("integer overflow in '{operator}'")]
    Overflow { operator: &'static str, span: Span },
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::Unresolved { span, .. }
            | EvalError::NotFound { span, .. }
            | EvalError::NotCallable { span, .. }
            | EvalError::Arity { span, .. }
            | EvalError::NotASymbol { span, .. }
            | EvalError::NotABindingList { span, .. }
            | EvalError::OddBindings { span, .. }
            | EvalError::NotANumber { span, .. }
            | EvalError::DivisionByZero { span }
            | EvalError::Overflow { span, .. } => *span,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Node> = Result<T, EvalError>;

const DEF: &str = "def!";
const LET: &str = "let*";
const IF: &str = "if";
const DO: &str = "do";

/// Names that are dispatched as special forms before any evaluation.
pub fn special_form_identifiers() -> HashSet<String> {
    [DEF, LET, IF, DO].iter().map(|s| s.to_string()).collect()
}

// --- Evaluate Function ---

/// Evaluates a given AST Node within the specified environment.
pub fn evaluate(node: &Node, env: &mut Environment<'_>) -> EvalResult {
    match &node.kind {
        // The reader guarantees at most one child
        Sexpr::Root(children) => match children.first() {
            Some(child) => evaluate(child, env),
            None => Ok(Node::new_nil(node.span)),
        },

        Sexpr::Symbol(name) => match env.get(name) {
            Some(value) => Ok(value.clone()),
            None => Err(EvalError::Unresolved {
                name: name.clone(),
                span: node.span,
            }),
        },

        // Self-evaluating
        Sexpr::Number(_) | Sexpr::String(_) | Sexpr::Bool(_) | Sexpr::Nil | Sexpr::Func(_) => {
            Ok(node.clone())
        }

        Sexpr::Vector(children) | Sexpr::Hashmap(children) => {
            if children.is_empty() {
                return Ok(node.clone());
            }
            // TODO: pair up hashmap keys and values once key semantics are settled
            let evaluated = evaluate_all(children, env)?;
            let kind = match node.node_kind() {
                NodeKind::Hashmap => Sexpr::Hashmap(evaluated),
                _ => Sexpr::Vector(evaluated),
            };
            Ok(Node::new(kind, node.span))
        }

        Sexpr::List(elements) => match elements.split_first() {
            None => Ok(node.clone()),
            Some((head, operands)) => match head.kind.as_symbol() {
                Some(DEF) => evaluate_def(operands, env, node.span),
                Some(LET) => evaluate_let(operands, env, node.span),
                Some(IF) => evaluate_if(operands, env, node.span),
                Some(DO) => evaluate_do(operands, env, node.span),
                _ => evaluate_application(head, operands, env, node.span),
            },
        },
    }
}

// Left to right, stopping at the first error
fn evaluate_all(nodes: &[Node], env: &mut Environment<'_>) -> EvalResult<Vec<Node>> {
    nodes.iter().map(|node| evaluate(node, env)).collect()
}

fn evaluate_application(
    head: &Node,
    operands: &[Node],
    env: &mut Environment<'_>,
    span: Span,
) -> EvalResult {
    let args = evaluate_all(operands, env)?;

    let procedure: Procedure = match &head.kind {
        Sexpr::Symbol(name) => match env.get(name).map(|value| value.kind.as_procedure()) {
            Some(Some(procedure)) => procedure.clone(),
            Some(None) => {
                return Err(EvalError::NotCallable {
                    repr: name.clone(),
                    span: head.span,
                });
            }
            None => {
                return Err(EvalError::NotFound {
                    name: name.clone(),
                    span: head.span,
                });
            }
        },
        // A computed head, e.g. ((if c + -) 1 2)
        _ => match evaluate(head, env)?.kind {
            Sexpr::Func(procedure) => procedure,
            other => {
                return Err(EvalError::NotCallable {
                    repr: other.to_string(),
                    span: head.span,
                });
            }
        },
    };

    trace!(procedure = procedure.name(), argc = args.len(), "applying");
    procedure.apply(args, span)
}

// Binds the evaluated value in the innermost frame and returns it
fn define(
    form: &'static str,
    name: &Node,
    value: &Node,
    env: &mut Environment<'_>,
) -> EvalResult {
    let Sexpr::Symbol(symbol) = &name.kind else {
        return Err(EvalError::NotASymbol {
            form,
            repr: name.to_string(),
            span: name.span,
        });
    };
    let evaluated = evaluate(value, env)?;
    debug!(symbol = %symbol, depth = env.depth(), "binding");
    env.set(symbol.clone(), evaluated.clone());
    Ok(evaluated)
}

fn evaluate_def(operands: &[Node], env: &mut Environment<'_>, span: Span) -> EvalResult {
    let [name, value] = operands else {
        return Err(EvalError::Arity {
            form: DEF,
            expected: "exactly 2",
            found: operands.len(),
            span,
        });
    };
    define(DEF, name, value, env)
}

fn evaluate_let(operands: &[Node], env: &mut Environment<'_>, span: Span) -> EvalResult {
    let [bindings, body] = operands else {
        return Err(EvalError::Arity {
            form: LET,
            expected: "exactly 2",
            found: operands.len(),
            span,
        });
    };
    let pairs = match &bindings.kind {
        Sexpr::List(pairs) | Sexpr::Vector(pairs) | Sexpr::Hashmap(pairs) => pairs,
        other => {
            return Err(EvalError::NotABindingList {
                repr: other.to_string(),
                span: bindings.span,
            });
        }
    };
    if pairs.len() % 2 != 0 {
        return Err(EvalError::OddBindings {
            count: pairs.len(),
            span: bindings.span,
        });
    }

    env.with_enclosed(|scope| {
        // Sequential: each value sees the bindings before it
        for pair in pairs.chunks_exact(2) {
            define(LET, &pair[0], &pair[1], scope)?;
        }
        evaluate(body, scope)
    })
}

fn evaluate_if(operands: &[Node], env: &mut Environment<'_>, span: Span) -> EvalResult {
    let (condition, consequent, alternate) = match operands {
        [condition, consequent] => (condition, consequent, None),
        [condition, consequent, alternate] => (condition, consequent, Some(alternate)),
        _ => {
            return Err(EvalError::Arity {
                form: IF,
                expected: "2 or 3",
                found: operands.len(),
                span,
            });
        }
    };

    if evaluate(condition, env)?.kind.is_truthy() {
        evaluate(consequent, env)
    } else {
        match alternate {
            Some(alternate) => evaluate(alternate, env),
            None => Ok(Node::new_nil(span)),
        }
    }
}

fn evaluate_do(operands: &[Node], env: &mut Environment<'_>, span: Span) -> EvalResult {
    let Some((last, init)) = operands.split_last() else {
        return Err(EvalError::Arity {
            form: DO,
            expected: "at least 1",
            found: 0,
            span,
        });
    };
    for node in init {
        evaluate(node, env)?;
    }
    evaluate(last, env)
}

/// Reads and evaluates one line of input.
pub fn evaluate_str(input: &str, env: &mut Environment<'_>) -> Result<Node, crate::Error> {
    let root = parse_str(input)?;
    Ok(evaluate(&root, env)?)
}
