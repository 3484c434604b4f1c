use crate::{MlErr, Result};

/// Checks that every label is either `0` or `1`.
///
/// # Returns
/// An `MlErr::InvalidLabel` with the first offending sample.
pub fn validate_labels(labels: &[u8]) -> Result<()> {
    match labels.iter().position(|&label| label > 1) {
        Some(index) => Err(MlErr::InvalidLabel {
            index,
            label: labels[index],
        }),
        None => Ok(()),
    }
}

/// Per-class loss weights of a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassWeights([f64; 2]);

impl ClassWeights {
    /// Computes weights that give both classes the same expected contribution.
    ///
    /// `weight[c] = n / (2 * count[c])`, so `weight[0] * count[0] == weight[1] * count[1] == n / 2`.
    ///
    /// # Arguments
    /// * `labels` - The labels of the batch.
    ///
    /// # Returns
    /// The weights, or an error if a label isn't binary (`MlErr::InvalidLabel`) or either
    /// class is missing from the batch (`MlErr::DegenerateBatch`).
    pub fn balanced(labels: &[u8]) -> Result<Self> {
        validate_labels(labels)?;

        let ones = labels.iter().filter(|&&label| label == 1).count();
        let counts = [labels.len() - ones, ones];

        if let Some(class) = counts.iter().position(|&count| count == 0) {
            return Err(MlErr::DegenerateBatch { class: class as u8 });
        }

        let n = labels.len() as f64;
        Ok(Self(counts.map(|count| n / (2. * count as f64))))
    }

    /// Creates explicit class weights.
    ///
    /// # Returns
    /// The weights, or an `MlErr::InvalidWeight` if either of them isn't a finite positive number.
    pub fn new(w0: f64, w1: f64) -> Result<Self> {
        for (class, weight) in [(0, w0), (1, w1)] {
            if !(weight.is_finite() && weight > 0.) {
                return Err(MlErr::InvalidWeight { class, weight });
            }
        }

        Ok(Self([w0, w1]))
    }

    /// Weights of `1` for both classes.
    pub fn uniform() -> Self {
        Self([1., 1.])
    }

    /// The weight of `class`, if it's a valid label.
    pub fn get(&self, class: u8) -> Option<f64> {
        self.0.get(class as usize).copied()
    }

    pub fn as_array(&self) -> [f64; 2] {
        self.0
    }
}
