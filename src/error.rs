use crate::evaluator::EvalError;
use crate::parser::ParseError;
use crate::source::Span;
use thiserror::Error;

/// Anything that can go wrong between reading a line and producing a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Parse(error) => error.span(),
            Error::Eval(error) => Some(error.span()),
        }
    }

    /// Blank or comment-only input. Callers driving a loop should skip it.
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Error::Parse(ParseError::Empty))
    }
}
