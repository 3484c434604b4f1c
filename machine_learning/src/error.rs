use std::{
    error::Error,
    fmt::{self, Display},
    time::Duration,
};

use circuit::EvalErr;

use crate::convention::OutputConvention;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// Why a single evaluator call was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalFault {
    /// The backend reported an error.
    Backend(EvalErr),
    /// The backend returned `NaN` or an infinite value.
    NonFinite(f64),
    /// The backend returned a value outside the range of the configured convention.
    OutOfRange {
        value: f64,
        convention: OutputConvention,
    },
}

impl Display for EvalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalFault::Backend(e) => write!(f, "{e}"),
            EvalFault::NonFinite(value) => write!(f, "the evaluator returned {value}"),
            EvalFault::OutOfRange { value, convention } => {
                let (lo, hi) = convention.range();
                write!(
                    f,
                    "the evaluator returned {value}, outside of [{lo}, {hi}] for the {convention} convention"
                )
            }
        }
    }
}

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    /// A label outside of `{0, 1}` was found.
    InvalidLabel { index: usize, label: u8 },
    /// One of the classes has no samples, so its weight is undefined.
    DegenerateBatch { class: u8 },
    /// A class weight that is not a finite positive number.
    InvalidWeight { class: u8, weight: f64 },
    EmptyBatch,
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidConfig(String),
    ThreadPool(String),
    /// A shard's computation crashed.
    WorkerFailure {
        batch: usize,
        shard: usize,
        cause: String,
    },
    /// The circuit evaluator failed while processing a sample of a shard.
    EvaluatorFailure {
        batch: usize,
        shard: usize,
        sample: usize,
        cause: EvalFault,
    },
    /// The batch took longer than the configured limit.
    Timeout {
        batch: usize,
        shard: usize,
        limit: Duration,
    },
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::InvalidLabel { index, label } => {
                write!(f, "invalid label {label} at sample {index}, expected 0 or 1")
            }
            MlErr::DegenerateBatch { class } => {
                write!(f, "the batch has no samples of class {class}")
            }
            MlErr::InvalidWeight { class, weight } => {
                write!(f, "invalid weight {weight} for class {class}")
            }
            MlErr::EmptyBatch => f.write_str("the batch has no samples"),
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "there's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            MlErr::ThreadPool(msg) => write!(f, "failed to build the worker pool: {msg}"),
            MlErr::WorkerFailure {
                batch,
                shard,
                cause,
            } => write!(f, "batch {batch}: shard {shard} failed: {cause}"),
            MlErr::EvaluatorFailure {
                batch,
                shard,
                sample,
                cause,
            } => write!(
                f,
                "batch {batch}: shard {shard} failed to evaluate sample {sample}: {cause}"
            ),
            MlErr::Timeout {
                batch,
                shard,
                limit,
            } => write!(
                f,
                "batch {batch}: shard {shard} exceeded the time limit of {limit:?}"
            ),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::EvaluatorFailure {
                cause: EvalFault::Backend(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}

impl MlErr {
    /// The index of the failed batch, if this is a batch-level failure rather than an input error.
    pub fn batch(&self) -> Option<usize> {
        match self {
            MlErr::WorkerFailure { batch, .. }
            | MlErr::EvaluatorFailure { batch, .. }
            | MlErr::Timeout { batch, .. } => Some(*batch),
            _ => None,
        }
    }
}
