use crate::{MlErr, Result};

/// Defines the strategy for updating the learnable angles based on a batch's step direction.
///
/// Every implementation reduces the updated angles modulo `2π`, so parameters always stay in
/// the canonical `[0, 2π)` range.
pub trait Optimizer {
    /// Updates the provided angles using the batch's averaged step direction.
    ///
    /// # Arguments
    /// * `grad` - The step direction, one entry per angle.
    /// * `params` - The angles to update.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad` and `params`.
    fn update_params(&mut self, grad: &[f64], params: &mut [f64]) -> Result<()>;
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn update_params(&mut self, grad: &[f64], params: &mut [f64]) -> Result<()> {
        (**self).update_params(grad, params)
    }
}

pub(super) fn check_len(grad: &[f64], params: &[f64]) -> Result<()> {
    if grad.len() != params.len() {
        return Err(MlErr::SizeMismatch {
            what: "gradient",
            got: grad.len(),
            expected: params.len(),
        });
    }

    Ok(())
}
