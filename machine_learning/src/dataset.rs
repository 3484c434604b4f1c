use std::ops::Range;

use ndarray::{Array2, ArrayView2, s};

use crate::{MlErr, Result};

/// A batch of angle-encoded edges and their labels.
///
/// Row `i` of the features always belongs to label `i`. The batch is immutable once built
/// and only hands out index-aligned views, so sharding can never break that pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeBatch {
    features: Array2<f64>,
    labels: Vec<u8>,
}

impl EdgeBatch {
    /// Creates a new `EdgeBatch`.
    ///
    /// # Arguments
    /// * `features` - One row of angle-encoded features per edge.
    /// * `labels` - One label per edge, `1` for a real track segment and `0` for a spurious one.
    ///
    /// # Returns
    /// A new `EdgeBatch` or an `MlErr::SizeMismatch` if there isn't exactly one label per row.
    pub fn new(features: Array2<f64>, labels: Vec<u8>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(MlErr::SizeMismatch {
                what: "labels",
                got: labels.len(),
                expected: features.nrows(),
            });
        }

        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The amount of features per edge.
    pub fn width(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Borrows the contiguous slice `range` of the batch.
    ///
    /// # Panics
    /// If `range` is out of bounds.
    pub fn slice(&self, range: Range<usize>) -> (ArrayView2<'_, f64>, &[u8]) {
        let features = self.features.slice(s![range.clone(), ..]);
        (features, &self.labels[range])
    }
}
