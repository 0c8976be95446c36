use crate::{EvalError, EvalResult, Node, Span};

// Extracts the number from an argument or reports it by its printed form
fn expect_number(node: &Node, span: Span) -> Result<i64, EvalError> {
    node.kind.as_number().ok_or_else(|| EvalError::NotANumber {
        repr: node.to_string(),
        span,
    })
}

fn overflow(operator: &'static str, span: Span) -> EvalError {
    EvalError::Overflow { operator, span }
}

fn fold_numbers<F: Fn(i64, i64) -> Option<i64>>(
    args: &[Node],
    span: Span,
    start: i64,
    func: F,
    operator: &'static str,
) -> Result<i64, EvalError> {
    let mut acc = start;
    for node in args {
        let num = expect_number(node, span)?;
        acc = func(acc, num).ok_or_else(|| overflow(operator, span))?;
    }
    Ok(acc)
}

pub fn prim_add(args: Vec<Node>, span: Span) -> EvalResult {
    // (+) -> 0
    // (+ 1 2 3) -> 6
    let sum = fold_numbers(&args, span, 0, i64::checked_add, "+")?;
    Ok(Node::new_number(sum, span))
}

pub fn prim_sub(args: Vec<Node>, span: Span) -> EvalResult {
    // (-) -> 0
    // (- x) -> x, not negated
    // (- x y z) -> x - y - z
    let result = match args.split_first() {
        None => 0,
        Some((first, rest)) => {
            let first = expect_number(first, span)?;
            fold_numbers(rest, span, first, i64::checked_sub, "-")?
        }
    };
    Ok(Node::new_number(result, span))
}

pub fn prim_mul(args: Vec<Node>, span: Span) -> EvalResult {
    // (*) -> 1
    // (* 1 2 3) -> 6
    let product = fold_numbers(&args, span, 1, i64::checked_mul, "*")?;
    Ok(Node::new_number(product, span))
}

pub fn prim_div(args: Vec<Node>, span: Span) -> EvalResult {
    // (/) and (/ x) -> 0
    // (/ x y z) -> x / y / z, truncating
    let result = match args.split_first() {
        Some((first, rest)) if !rest.is_empty() => {
            let mut acc = expect_number(first, span)?;
            for node in rest {
                let divisor = expect_number(node, span)?;
                if divisor == 0 {
                    // Abort the fold at the first zero divisor
                    return Err(EvalError::DivisionByZero { span });
                }
                acc = acc.checked_div(divisor).ok_or_else(|| overflow("/", span))?;
            }
            acc
        }
        _ => {
            for node in &args {
                expect_number(node, span)?;
            }
            0
        }
    };
    Ok(Node::new_number(result, span))
}
