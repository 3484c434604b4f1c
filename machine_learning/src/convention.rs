use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::EvalFault;

/// Slack allowed on each side of the convention's range to absorb rounding in the backend.
const RANGE_SLACK: f64 = 1e-9;

/// The range convention of a circuit backend's output.
///
/// Loss and gradients are always computed on a probability-like value in `[0, 1]`, so an
/// `Expectation` output is rescaled as `(value + 1) / 2` before use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputConvention {
    /// A probability-like value in `[0, 1]`, such as a measurement frequency.
    #[default]
    Probability,
    /// An expectation value in `[-1, 1]`.
    Expectation,
}

impl OutputConvention {
    /// The closed range of valid raw outputs.
    pub fn range(self) -> (f64, f64) {
        match self {
            OutputConvention::Probability => (0., 1.),
            OutputConvention::Expectation => (-1., 1.),
        }
    }

    /// Validates a raw evaluator output and maps it onto `[0, 1]`.
    ///
    /// # Arguments
    /// * `raw` - The value returned by the evaluator.
    ///
    /// # Returns
    /// The probability-like value, or an `EvalFault` if `raw` isn't finite or falls outside
    /// of the convention's range.
    pub fn to_probability(self, raw: f64) -> Result<f64, EvalFault> {
        if !raw.is_finite() {
            return Err(EvalFault::NonFinite(raw));
        }

        let (lo, hi) = self.range();
        if raw < lo - RANGE_SLACK || raw > hi + RANGE_SLACK {
            return Err(EvalFault::OutOfRange {
                value: raw,
                convention: self,
            });
        }

        let raw = raw.clamp(lo, hi);
        Ok(match self {
            OutputConvention::Probability => raw,
            OutputConvention::Expectation => (raw + 1.) / 2.,
        })
    }
}

impl Display for OutputConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputConvention::Probability => "probability",
            OutputConvention::Expectation => "expectation",
        })
    }
}
