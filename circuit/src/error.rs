use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type returned by every circuit evaluator.
pub type Result<T> = std::result::Result<T, EvalErr>;

/// Errors a circuit backend may report while evaluating an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalErr {
    /// The features or the parameters don't have the length the circuit was built for.
    ArityMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// The backend itself failed, e.g. a sampler rejected its inputs.
    Backend(String),
}

impl Display for EvalErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalErr::ArityMismatch {
                what,
                got,
                expected,
            } => write!(f, "the circuit expects {expected} {what}, got {got}"),
            EvalErr::Backend(msg) => write!(f, "circuit backend failure: {msg}"),
        }
    }
}

impl Error for EvalErr {}
