use crate::{Error, EvalError, ParseError};
use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use std::ops::Range;

const SOURCE_ID: &str = "REPL";

fn report<'a>(
    range: Range<usize>,
    message: String,
    label: String,
) -> Report<'a, (&'static str, Range<usize>)> {
    Report::build(ReportKind::Error, (SOURCE_ID, range.clone()))
        .with_config(Config::default().with_index_type(IndexType::Byte))
        .with_message(message)
        .with_label(Label::new((SOURCE_ID, range)).with_message(label))
        .finish()
}

impl ParseError {
    pub fn report(&self, input: &str) -> Report<'static, (&'static str, Range<usize>)> {
        let range = match self.span() {
            Some(span) => span.to_range(),
            None => input.len()..input.len(),
        };
        let label = match self {
            ParseError::Invalid { .. } => "This token could not be read".to_string(),
            ParseError::Mismatched { current, .. } => {
                format!("This delimiter does not close the enclosing {}", current)
            }
            ParseError::MultipleTopLevel { .. } => {
                "Only one form is allowed outside a list".to_string()
            }
            ParseError::Unbalanced { .. } => "This is never closed".to_string(),
            ParseError::Empty => "Nothing to read".to_string(),
            ParseError::InvalidNumber { .. } => "Out of range".to_string(),
            ParseError::InvalidEscape { escape, .. } => {
                format!("Supported escapes are \\n \\r \\t \\\\ \\\", not \\{}", escape)
            }
        };
        report(range, self.to_string(), label)
    }
}

impl EvalError {
    pub fn report(&self, _input: &str) -> Report<'static, (&'static str, Range<usize>)> {
        let label = match self {
            EvalError::Unresolved { .. } => {
                "This symbol is not defined in the current scope".to_string()
            }
            EvalError::NotFound { .. } => "No procedure is bound to this name".to_string(),
            EvalError::NotCallable { .. } => {
                "This expression cannot be called as a procedure".to_string()
            }
            EvalError::Arity { form, .. } => format!("This '{}' form is malformed", form),
            EvalError::NotASymbol { .. } => "Expected a symbol here".to_string(),
            EvalError::NotABindingList { .. } => "Expected (name value ...) here".to_string(),
            EvalError::OddBindings { .. } => "One name is missing its value".to_string(),
            EvalError::NotANumber { .. } => "Every argument must be a number".to_string(),
            EvalError::DivisionByZero { .. } => "A divisor evaluated to 0".to_string(),
            EvalError::Overflow { .. } => "The result does not fit in 64 bits".to_string(),
        };
        report(self.span().to_range(), self.to_string(), label)
    }
}

impl Error {
    pub fn report(&self, input: &str) -> Report<'static, (&'static str, Range<usize>)> {
        match self {
            Error::Parse(error) => error.report(input),
            Error::Eval(error) => error.report(input),
        }
    }

    /// Writes a labelled diagnostic for `input` to stderr.
    pub fn pretty_print(&self, input: &str) -> std::io::Result<()> {
        self.report(input)
            .eprint((SOURCE_ID, Source::from(input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Environment, evaluate_str};

    fn render(error: &Error, input: &str) -> String {
        let mut out = Vec::new();
        error
            .report(input)
            .write((SOURCE_ID, Source::from(input)), &mut out)
            .expect("writing to a Vec cannot fail");
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    fn test_report_mentions_message() {
        let input = "(+ 1 undefined)";
        let error = evaluate_str(input, &mut Environment::new_global_populated())
            .expect_err("should fail");
        let rendered = render(&error, input);
        assert!(rendered.contains("'undefined' could not be resolved"));
        assert!(rendered.contains("not defined in the current scope"));
    }

    #[test]
    fn test_report_for_parse_errors() {
        for input in ["(1 2", "\"abc", "1 2", "(]"] {
            let error = evaluate_str(input, &mut Environment::new_global_populated())
                .expect_err("should fail");
            let rendered = render(&error, input);
            assert!(rendered.contains(&error.to_string()), "Input: '{}'", input);
        }
    }
}
